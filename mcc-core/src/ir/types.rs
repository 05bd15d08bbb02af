//! Value Types
//!
//! The type attached to symbols, IR values, and instructions: a scalar base
//! type plus a (possibly empty) list of static array dimensions, a pointer
//! flag, and a const flag. Pointer types carry a leading sentinel dimension
//! of 0 (a function parameter `int a[][3]` has dims `[0, 3]`).
//!
//! `pop` consumes one dimension from the front without reallocating, which
//! is how getelementptr lowering walks an index chain: the dimensions are
//! kept in full and a view offset advances.

use smallvec::SmallVec;

/// Scalar base of a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BaseType {
    Void = 0,
    I1 = 1,
    I8 = 2,
    I32 = 3,
}

impl BaseType {
    /// Size of one scalar in bytes.
    pub fn size(self) -> i32 {
        match self {
            BaseType::Void => 0,
            BaseType::I1 | BaseType::I8 => 1,
            BaseType::I32 => 4,
        }
    }
}

/// A source-level or IR-level type.
#[derive(Debug, Clone)]
pub struct ValueType {
    pub base: BaseType,
    pub is_const: bool,
    pub is_pointer: bool,
    dims: SmallVec<[i32; 2]>,
    offset: usize,
}

impl ValueType {
    pub fn scalar(base: BaseType) -> Self {
        Self {
            base,
            is_const: false,
            is_pointer: false,
            dims: SmallVec::new(),
            offset: 0,
        }
    }

    pub const fn void() -> Self {
        Self {
            base: BaseType::Void,
            is_const: false,
            is_pointer: false,
            dims: SmallVec::new_const(),
            offset: 0,
        }
    }

    pub fn int() -> Self {
        Self::scalar(BaseType::I32)
    }

    pub fn bool_ty() -> Self {
        Self::scalar(BaseType::I1)
    }

    pub fn byte_pointer() -> Self {
        let mut ty = Self::scalar(BaseType::I8);
        ty.is_pointer = true;
        ty.dims.push(0);
        ty
    }

    /// Number of dimensions visible through the current view.
    pub fn dim_len(&self) -> usize {
        self.dims.len() - self.offset
    }

    pub fn is_array(&self) -> bool {
        self.dim_len() > 0
    }

    /// Dimension `i` of the view, or -1 out of range.
    pub fn dim(&self, i: usize) -> i32 {
        if i < self.dim_len() {
            self.dims[self.offset + i]
        } else {
            -1
        }
    }

    /// Append one array dimension (innermost position).
    pub fn push_dim(&mut self, dim: i32) {
        self.dims.push(dim);
    }

    /// `int` scalar, neither array nor pointer. The operand type every
    /// arithmetic context requires.
    pub fn is_int_scalar(&self) -> bool {
        self.base == BaseType::I32 && !self.is_array() && !self.is_pointer
    }

    pub fn is_void(&self) -> bool {
        self.base == BaseType::Void
    }

    /// Total size in bytes of a value of this type.
    pub fn size(&self) -> i32 {
        let mut size = self.base.size();
        for i in 0..self.dim_len() {
            size *= self.dim(i).max(0);
        }
        size
    }

    /// Number of scalar elements.
    pub fn element_count(&self) -> i32 {
        let mut count = 1;
        for i in 0..self.dim_len() {
            count *= self.dim(i).max(0);
        }
        count
    }

    /// Consume the outermost dimension; also strips pointer-ness.
    pub fn pop(&mut self) {
        if self.is_array() {
            self.offset += 1;
        }
        self.is_pointer = false;
    }

    /// The pointer type to this type (a leading 0 dimension plus the
    /// pointer flag). Used for display of getelementptr base operands.
    pub fn to_pointer(&self) -> Self {
        let mut ptr = self.clone();
        if !ptr.is_pointer {
            ptr.dims.insert(ptr.offset, 0);
            ptr.is_pointer = true;
        }
        ptr
    }

    /// The base scalar of this type with no dimensions.
    pub fn base_type(&self) -> Self {
        Self::scalar(self.base)
    }

    /// True when indexing by the dimensions of `self` stays within the
    /// bounds of `other`: same base and rank, every dimension in range.
    pub fn index_within(&self, other: &ValueType) -> bool {
        if self.base != other.base || self.dim_len() != other.dim_len() {
            return false;
        }
        for i in 0..self.dim_len() {
            if self.dim(i) < 0 || other.dim(i) <= self.dim(i) {
                return false;
            }
        }
        true
    }
}

impl PartialEq for ValueType {
    /// Equality ignores constness and compares dimensions through the view,
    /// skipping the sentinel dimension when either side is a pointer.
    fn eq(&self, other: &Self) -> bool {
        if self.base != other.base || self.dim_len() != other.dim_len() {
            return false;
        }
        let first = if self.is_pointer || other.is_pointer { 1 } else { 0 };
        for i in first..self.dim_len() {
            if self.dim(i) != other.dim(i) {
                return false;
            }
        }
        true
    }
}

impl Eq for ValueType {}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let base = match self.base {
            BaseType::Void => "void",
            BaseType::I1 => "i1",
            BaseType::I8 => "i8",
            BaseType::I32 => "i32",
        };
        let first = if self.is_pointer { 1 } else { 0 };
        for i in first..self.dim_len() {
            write!(f, "[{} x ", self.dim(i))?;
        }
        write!(f, "{}", base)?;
        for _ in first..self.dim_len() {
            write!(f, "]")?;
        }
        if self.is_pointer {
            write!(f, "*")?;
        }
        Ok(())
    }
}
