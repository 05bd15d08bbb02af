//! Expression Hashing
//!
//! The hash-consed algebra shared by IR-level and machine-level value
//! numbering. An expression shape is described by a tree of nodes: integer
//! literals, register ids, ordered arrays, and unordered sets (commutative
//! operand pairs hash the same in either order). Hash values live in the
//! field modulo a large prime; equality is structural, so colliding hashes
//! never merge distinct expressions.

const MOD: i64 = 998_244_353;

/// One node of an expression shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashItem {
    /// A known constant.
    Const(i32),
    /// A register identified by a stable id (IR value id or machine
    /// virtual-register id; negative ids encode physical registers).
    Reg(i64),
    /// Ordered children (non-commutative operands, index chains).
    Array(Vec<HashItem>),
    /// Unordered children (commutative operand pairs).
    Set(Vec<HashItem>),
}

fn mix(v: i64) -> i64 {
    let v = v.rem_euclid(MOD);
    let mut r = (v * v % MOD * v + v) % MOD;
    r ^= (v * v % MOD) >> 7;
    r ^= (v & 0x3fff) << 17;
    r.rem_euclid(MOD)
}

impl HashItem {
    /// The node's hash value. Sets sort their children's hashes so operand
    /// order does not matter; arrays weight children by position.
    pub fn hash_value(&self) -> i64 {
        match self {
            HashItem::Const(v) => (*v as i64).rem_euclid(MOD),
            HashItem::Reg(id) => id.rem_euclid(MOD),
            HashItem::Array(items) => {
                let mut hash = 0i64;
                for (i, item) in items.iter().enumerate() {
                    hash = (hash + (i as i64 + 1) * mix(item.hash_value())) % MOD;
                }
                hash
            }
            HashItem::Set(items) => {
                let mut hashes: Vec<i64> = items.iter().map(|i| mix(i.hash_value())).collect();
                hashes.sort_unstable();
                let mut hash = 1i64;
                for h in hashes {
                    hash = hash * h % MOD;
                }
                hash
            }
        }
    }

    /// Structural equality with set children compared as multisets.
    pub fn matches(&self, other: &HashItem) -> bool {
        match (self, other) {
            (HashItem::Const(a), HashItem::Const(b)) => a == b,
            (HashItem::Reg(a), HashItem::Reg(b)) => a == b,
            (HashItem::Array(a), HashItem::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.matches(y))
            }
            (HashItem::Set(a), HashItem::Set(b)) => {
                if a.len() != b.len() {
                    return false;
                }
                let mut sa: Vec<&HashItem> = a.iter().collect();
                let mut sb: Vec<&HashItem> = b.iter().collect();
                sa.sort_by_key(|i| i.hash_value());
                sb.sort_by_key(|i| i.hash_value());
                sa.iter().zip(sb).all(|(x, y)| x.matches(y))
            }
            _ => false,
        }
    }
}

/// A value-numbering table: hash buckets of `(shape, numbered value)`.
#[derive(Debug, Default)]
pub struct HashTable<T: Clone> {
    buckets: std::collections::HashMap<i64, Vec<(HashItem, T)>>,
}

impl<T: Clone> HashTable<T> {
    pub fn new() -> Self {
        Self {
            buckets: std::collections::HashMap::new(),
        }
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
    }

    /// Look up a structurally equal shape.
    pub fn lookup(&self, item: &HashItem) -> Option<T> {
        let bucket = self.buckets.get(&item.hash_value())?;
        bucket
            .iter()
            .find(|(shape, _)| item.matches(shape))
            .map(|(_, value)| value.clone())
    }

    /// Record a shape for later lookups.
    pub fn insert(&mut self, item: HashItem, value: T) {
        self.buckets
            .entry(item.hash_value())
            .or_default()
            .push((item, value));
    }

    /// Remove one entry with this exact shape (scoped value numbering
    /// rolls insertions back when leaving a dominator-tree subtree).
    pub fn remove(&mut self, item: &HashItem) {
        if let Some(bucket) = self.buckets.get_mut(&item.hash_value()) {
            if let Some(pos) = bucket.iter().position(|(shape, _)| item.matches(shape)) {
                bucket.remove(pos);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commutative_pairs_hash_equal() {
        let a = HashItem::Set(vec![HashItem::Reg(1), HashItem::Reg(2)]);
        let b = HashItem::Set(vec![HashItem::Reg(2), HashItem::Reg(1)]);
        assert_eq!(a.hash_value(), b.hash_value());
        assert!(a.matches(&b));
    }

    #[test]
    fn ordered_pairs_hash_differently() {
        let a = HashItem::Array(vec![HashItem::Reg(1), HashItem::Reg(2)]);
        let b = HashItem::Array(vec![HashItem::Reg(2), HashItem::Reg(1)]);
        assert!(!a.matches(&b));
    }

    #[test]
    fn table_round_trip() {
        let mut table: HashTable<u32> = HashTable::new();
        let shape = HashItem::Array(vec![HashItem::Const(3), HashItem::Reg(7)]);
        table.insert(shape.clone(), 42);
        assert_eq!(table.lookup(&shape), Some(42));
        table.remove(&shape);
        assert_eq!(table.lookup(&shape), None);
    }
}
