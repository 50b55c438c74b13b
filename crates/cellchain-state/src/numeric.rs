//! Transactional unsigned integers with checked arithmetic.
//!
//! Every operation validates before it writes: on failure the cell keeps its
//! previous value and nothing is recorded in the call scope.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitXor};

use ethnum::U256;

use crate::cell::TransactionalCell;
use crate::error::ArithmeticError;
use crate::scope::{CallScope, CellId, FrameId, Transactional};

/// Fixed-width unsigned integer usable in a numeric cell
pub trait Uint:
    Copy
    + Ord
    + fmt::Debug
    + fmt::Display
    + BitAnd<Output = Self>
    + BitOr<Output = Self>
    + BitXor<Output = Self>
    + Operand<Self>
{
    const ZERO: Self;
    const ONE: Self;
    const MAX: Self;
    const BITS: u32;

    fn checked_add(self, rhs: Self) -> Option<Self>;
    fn checked_sub(self, rhs: Self) -> Option<Self>;
    fn checked_mul(self, rhs: Self) -> Option<Self>;
    fn checked_div(self, rhs: Self) -> Option<Self>;
    fn checked_rem(self, rhs: Self) -> Option<Self>;
}

macro_rules! impl_uint {
    ($($t:ty),*) => {
        $(
            impl Uint for $t {
                const ZERO: Self = 0;
                const ONE: Self = 1;
                const MAX: Self = <$t>::MAX;
                const BITS: u32 = <$t>::BITS;

                fn checked_add(self, rhs: Self) -> Option<Self> { <$t>::checked_add(self, rhs) }
                fn checked_sub(self, rhs: Self) -> Option<Self> { <$t>::checked_sub(self, rhs) }
                fn checked_mul(self, rhs: Self) -> Option<Self> { <$t>::checked_mul(self, rhs) }
                fn checked_div(self, rhs: Self) -> Option<Self> { <$t>::checked_div(self, rhs) }
                fn checked_rem(self, rhs: Self) -> Option<Self> { <$t>::checked_rem(self, rhs) }
            }

            impl Operand<$t> for $t {
                fn operand(&self) -> $t {
                    *self
                }
            }
        )*
    };
}

impl_uint!(u8, u16, u32, u64, u128);

impl Uint for U256 {
    const ZERO: Self = U256::ZERO;
    const ONE: Self = U256::ONE;
    const MAX: Self = U256::MAX;
    const BITS: u32 = 256;

    fn checked_add(self, rhs: Self) -> Option<Self> {
        U256::checked_add(self, rhs)
    }
    fn checked_sub(self, rhs: Self) -> Option<Self> {
        U256::checked_sub(self, rhs)
    }
    fn checked_mul(self, rhs: Self) -> Option<Self> {
        U256::checked_mul(self, rhs)
    }
    fn checked_div(self, rhs: Self) -> Option<Self> {
        U256::checked_div(self, rhs)
    }
    fn checked_rem(self, rhs: Self) -> Option<Self> {
        U256::checked_rem(self, rhs)
    }
}

impl Operand<U256> for U256 {
    fn operand(&self) -> U256 {
        *self
    }
}

/// Right-hand side of a numeric cell operation: a raw value or another cell
pub trait Operand<T> {
    fn operand(&self) -> T;
}

impl<T: Uint> Operand<T> for &TransactionalNumericCell<T> {
    fn operand(&self) -> T {
        self.get()
    }
}

/// Checked arithmetic on plain values, shared by the cell and by callers
/// that only need the error mapping.
pub mod checked {
    use super::Uint;
    use crate::error::ArithmeticError;

    pub fn add<T: Uint>(lhs: T, rhs: T) -> Result<T, ArithmeticError> {
        lhs.checked_add(rhs).ok_or(ArithmeticError::Overflow)
    }

    pub fn sub<T: Uint>(lhs: T, rhs: T) -> Result<T, ArithmeticError> {
        lhs.checked_sub(rhs).ok_or(ArithmeticError::Underflow)
    }

    pub fn mul<T: Uint>(lhs: T, rhs: T) -> Result<T, ArithmeticError> {
        lhs.checked_mul(rhs).ok_or(ArithmeticError::Overflow)
    }

    pub fn div<T: Uint>(lhs: T, rhs: T) -> Result<T, ArithmeticError> {
        if rhs == T::ZERO {
            return Err(ArithmeticError::DivByZero);
        }
        lhs.checked_div(rhs).ok_or(ArithmeticError::Overflow)
    }

    pub fn rem<T: Uint>(lhs: T, rhs: T) -> Result<T, ArithmeticError> {
        if rhs == T::ZERO {
            return Err(ArithmeticError::ModByZero);
        }
        lhs.checked_rem(rhs).ok_or(ArithmeticError::Overflow)
    }
}

/// A transactional cell holding a fixed-width unsigned integer
pub struct TransactionalNumericCell<T> {
    inner: TransactionalCell<T>,
}

impl<T: Uint> TransactionalNumericCell<T> {
    pub fn new(scope: &CallScope, value: T) -> Self {
        TransactionalNumericCell {
            inner: TransactionalCell::new(scope, value),
        }
    }

    pub fn zero(scope: &CallScope) -> Self {
        Self::new(scope, T::ZERO)
    }

    pub fn get(&self) -> T {
        *self.inner.get()
    }

    pub fn committed(&self) -> T {
        *self.inner.committed()
    }

    pub fn set(&mut self, value: T) {
        self.inner.set(value);
    }

    pub fn checked_add(&self, rhs: impl Operand<T>) -> Result<T, ArithmeticError> {
        checked::add(self.get(), rhs.operand())
    }

    pub fn checked_sub(&self, rhs: impl Operand<T>) -> Result<T, ArithmeticError> {
        checked::sub(self.get(), rhs.operand())
    }

    pub fn checked_mul(&self, rhs: impl Operand<T>) -> Result<T, ArithmeticError> {
        checked::mul(self.get(), rhs.operand())
    }

    pub fn checked_div(&self, rhs: impl Operand<T>) -> Result<T, ArithmeticError> {
        checked::div(self.get(), rhs.operand())
    }

    pub fn checked_rem(&self, rhs: impl Operand<T>) -> Result<T, ArithmeticError> {
        checked::rem(self.get(), rhs.operand())
    }

    pub fn bit_and(&self, rhs: impl Operand<T>) -> T {
        self.get() & rhs.operand()
    }

    pub fn bit_or(&self, rhs: impl Operand<T>) -> T {
        self.get() | rhs.operand()
    }

    pub fn bit_xor(&self, rhs: impl Operand<T>) -> T {
        self.get() ^ rhs.operand()
    }

    pub fn add_assign(&mut self, rhs: impl Operand<T>) -> Result<(), ArithmeticError> {
        let value = self.checked_add(rhs)?;
        self.set(value);
        Ok(())
    }

    pub fn sub_assign(&mut self, rhs: impl Operand<T>) -> Result<(), ArithmeticError> {
        let value = self.checked_sub(rhs)?;
        self.set(value);
        Ok(())
    }

    pub fn mul_assign(&mut self, rhs: impl Operand<T>) -> Result<(), ArithmeticError> {
        let value = self.checked_mul(rhs)?;
        self.set(value);
        Ok(())
    }

    pub fn div_assign(&mut self, rhs: impl Operand<T>) -> Result<(), ArithmeticError> {
        let value = self.checked_div(rhs)?;
        self.set(value);
        Ok(())
    }

    pub fn rem_assign(&mut self, rhs: impl Operand<T>) -> Result<(), ArithmeticError> {
        let value = self.checked_rem(rhs)?;
        self.set(value);
        Ok(())
    }

    pub fn and_assign(&mut self, rhs: impl Operand<T>) {
        let value = self.bit_and(rhs);
        self.set(value);
    }

    pub fn or_assign(&mut self, rhs: impl Operand<T>) {
        let value = self.bit_or(rhs);
        self.set(value);
    }

    pub fn xor_assign(&mut self, rhs: impl Operand<T>) {
        let value = self.bit_xor(rhs);
        self.set(value);
    }

    /// `++cell`, returning the new value
    pub fn increment(&mut self) -> Result<T, ArithmeticError> {
        self.add_assign(T::ONE)?;
        Ok(self.get())
    }

    /// `--cell`, returning the new value
    pub fn decrement(&mut self) -> Result<T, ArithmeticError> {
        self.sub_assign(T::ONE)?;
        Ok(self.get())
    }
}

impl<T: Uint> Transactional for TransactionalNumericCell<T> {
    fn cell_id(&self) -> CellId {
        self.inner.cell_id()
    }

    fn commit(&mut self) {
        self.inner.commit();
    }

    fn revert(&mut self) {
        self.inner.revert();
    }

    fn rollback(&mut self, frame: FrameId) {
        self.inner.rollback(frame);
    }

    fn is_staged(&self) -> bool {
        self.inner.is_staged()
    }
}

impl<T: fmt::Debug> fmt::Debug for TransactionalNumericCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overflow_at_max<T: Uint>() {
        let scope = CallScope::new();
        let mut cell = TransactionalNumericCell::new(&scope, T::MAX);
        assert_eq!(cell.add_assign(T::ONE), Err(ArithmeticError::Overflow));
        assert_eq!(cell.get(), T::MAX);
        assert!(!cell.is_staged());
    }

    #[test]
    fn test_overflow_leaves_max_for_every_width() {
        overflow_at_max::<u8>();
        overflow_at_max::<u16>();
        overflow_at_max::<u32>();
        overflow_at_max::<u64>();
        overflow_at_max::<u128>();
        overflow_at_max::<U256>();
    }

    #[test]
    fn test_underflow() {
        let scope = CallScope::new();
        let mut cell = TransactionalNumericCell::<u32>::zero(&scope);
        assert_eq!(cell.decrement(), Err(ArithmeticError::Underflow));
        assert_eq!(cell.sub_assign(5), Err(ArithmeticError::Underflow));
        assert_eq!(cell.get(), 0);
    }

    #[test]
    fn test_div_and_mod_by_zero() {
        let scope = CallScope::new();
        let mut cell = TransactionalNumericCell::new(&scope, 10u16);
        assert_eq!(cell.div_assign(0), Err(ArithmeticError::DivByZero));
        assert_eq!(cell.rem_assign(0), Err(ArithmeticError::ModByZero));
        assert_eq!(cell.get(), 10);

        cell.div_assign(3).unwrap();
        assert_eq!(cell.get(), 3);
        cell.rem_assign(2).unwrap();
        assert_eq!(cell.get(), 1);
    }

    #[test]
    fn test_multiplication_overflow() {
        let scope = CallScope::new();
        let mut cell = TransactionalNumericCell::new(&scope, 200u8);
        assert_eq!(cell.mul_assign(2), Err(ArithmeticError::Overflow));
        assert_eq!(cell.get(), 200);
    }

    #[test]
    fn test_cell_and_raw_operands_agree() {
        let scope = CallScope::new();
        let lhs = TransactionalNumericCell::new(&scope, 12u64);
        let rhs = TransactionalNumericCell::new(&scope, 5u64);

        assert_eq!(lhs.checked_add(&rhs), lhs.checked_add(5));
        assert_eq!(lhs.checked_sub(&rhs), lhs.checked_sub(5));
        assert_eq!(lhs.checked_mul(&rhs), lhs.checked_mul(5));
        assert_eq!(lhs.checked_div(&rhs), lhs.checked_div(5));
        assert_eq!(lhs.checked_rem(&rhs), lhs.checked_rem(5));
        assert_eq!(lhs.bit_and(&rhs), 12 & 5);
        assert_eq!(lhs.bit_or(&rhs), 12 | 5);
        assert_eq!(lhs.bit_xor(&rhs), 12 ^ 5);
        assert_eq!(rhs.checked_sub(&lhs), Err(ArithmeticError::Underflow));
    }

    #[test]
    fn test_compound_ops_then_revert() {
        let scope = CallScope::new();
        let mut cell = TransactionalNumericCell::new(&scope, 0b1010u8);

        cell.or_assign(0b0101);
        assert_eq!(cell.get(), 0b1111);
        cell.xor_assign(0b0011);
        assert_eq!(cell.get(), 0b1100);
        cell.and_assign(0b0100);
        assert_eq!(cell.get(), 0b0100);

        cell.revert();
        assert_eq!(cell.get(), 0b1010);
    }

    #[test]
    fn test_round_trip_commit_and_revert() {
        let scope = CallScope::new();
        let mut cell = TransactionalNumericCell::new(&scope, U256::from(7u64));

        cell.set(U256::from(99u64));
        cell.revert();
        assert_eq!(cell.get(), U256::from(7u64));

        cell.set(U256::from(99u64));
        cell.commit();
        assert_eq!(cell.get(), U256::from(99u64));
        assert_eq!(cell.committed(), U256::from(99u64));
    }

    #[test]
    fn test_increment_returns_new_value() {
        let scope = CallScope::new();
        let mut cell = TransactionalNumericCell::new(&scope, 41u64);
        assert_eq!(cell.increment().unwrap(), 42);
        assert_eq!(cell.decrement().unwrap(), 41);
    }
}
