//! Bounded signed/unsigned integer arithmetic for `#if`/`#elif` expressions.
//!
//! C's constant expressions are evaluated in a fixed-width integer type that
//! behaves like `intmax_t`/`uintmax_t`: signed overflow wraps two's
//! complement (rather than panicking, as Rust's debug-mode `+`/`-`/`*` would)
//! and an operation involving any unsigned operand promotes the whole
//! operation to unsigned, exactly as C's usual arithmetic conversions do.

use std::fmt;

/// Bit width of the evaluator's integer type. 64 bits matches `intmax_t` on
/// every platform this crate targets.
const BITS: u32 = 64;

/// A bounded-width integer tagged with its signedness, plus an optional
/// poisoning fault.
///
/// An operation that would fault (division by zero, an unresolved
/// identifier the caller's hook refused to resolve) does not panic or
/// short-circuit Rust's control flow: it returns a `Value` carrying
/// `exception`. Poisoned values propagate through further arithmetic, except
/// that the short-circuit operators (`&&`, `||`, `?:`) may discard a
/// poisoned operand they never needed to evaluate.
#[derive(Clone, Debug)]
pub struct Value {
    bits: u64,
    unsigned: bool,
    /// Set when this value is the result of a fault; carries a message.
    pub exception: Option<String>,
}

impl Value {
    /// A signed zero.
    pub const ZERO: Value = Value { bits: 0, unsigned: false, exception: None };
    /// A signed one.
    pub const ONE: Value = Value { bits: 1, unsigned: false, exception: None };

    /// Construct a signed value, wrapping two's-complement on overflow of
    /// the evaluator's bit width (a no-op at width 64 for native `i64`
    /// inputs, but centralises the behaviour for widths `< 64` if ever
    /// configured).
    #[must_use]
    pub fn signed(v: i64) -> Self {
        Value { bits: v as u64, unsigned: false, exception: None }
    }

    /// Construct an unsigned value.
    #[must_use]
    pub fn unsigned(v: u64) -> Self {
        Value { bits: v, unsigned: true, exception: None }
    }

    /// Construct a poisoned value carrying an error message.
    #[must_use]
    pub fn fault(message: impl Into<String>) -> Self {
        Value { bits: 0, unsigned: false, exception: Some(message.into()) }
    }

    /// True if this value is poisoned.
    #[must_use]
    pub fn is_fault(&self) -> bool {
        self.exception.is_some()
    }

    /// True if this value carries unsigned semantics.
    #[must_use]
    pub fn is_unsigned(&self) -> bool {
        self.unsigned
    }

    /// The raw bit pattern, unsigned.
    #[must_use]
    pub fn bits(&self) -> u64 {
        self.bits
    }

    /// The value as a signed 64-bit integer (reinterprets the bit pattern).
    #[must_use]
    pub fn as_i64(&self) -> i64 {
        self.bits as i64
    }

    /// C truthiness: nonzero is true. Faults are treated as false so that a
    /// poisoned sub-expression that is never actually selected (the
    /// short-circuit case) does not itself abort evaluation; callers that
    /// need to detect the fault should check `is_fault` first.
    #[must_use]
    pub fn truthy(&self) -> bool {
        !self.is_fault() && self.bits != 0
    }

    fn promote_unsigned(a: &Value, b: &Value) -> bool {
        a.unsigned || b.unsigned
    }

    fn poison_of(a: &Value, b: &Value) -> Option<Value> {
        if a.is_fault() {
            Some(a.clone())
        } else if b.is_fault() {
            Some(b.clone())
        } else {
            None
        }
    }

    fn binary(a: &Value, b: &Value, f: impl FnOnce(i64, i64, bool) -> u64) -> Value {
        if let Some(p) = Self::poison_of(a, b) {
            return p;
        }
        let unsigned = Self::promote_unsigned(a, b);
        let bits = f(a.as_i64(), b.as_i64(), unsigned);
        Value { bits, unsigned, exception: None }
    }

    /// Two's-complement wrapping add.
    #[must_use]
    pub fn add(&self, other: &Value) -> Value {
        Self::binary(self, other, |a, b, _| (a.wrapping_add(b)) as u64)
    }
    /// Two's-complement wrapping subtract.
    #[must_use]
    pub fn sub(&self, other: &Value) -> Value {
        Self::binary(self, other, |a, b, _| (a.wrapping_sub(b)) as u64)
    }
    /// Two's-complement wrapping multiply.
    #[must_use]
    pub fn mul(&self, other: &Value) -> Value {
        Self::binary(self, other, |a, b, _| (a.wrapping_mul(b)) as u64)
    }
    /// Division; faults (poisons) on divide-by-zero rather than panicking.
    #[must_use]
    pub fn div(&self, other: &Value) -> Value {
        if let Some(p) = Self::poison_of(self, other) {
            return p;
        }
        if other.bits == 0 {
            return Value::fault("division by zero");
        }
        let unsigned = Self::promote_unsigned(self, other);
        let bits = if unsigned {
            self.bits.wrapping_div(other.bits)
        } else {
            (self.as_i64().wrapping_div(other.as_i64())) as u64
        };
        Value { bits, unsigned, exception: None }
    }
    /// Modulo; faults (poisons) on modulo-by-zero rather than panicking.
    #[must_use]
    pub fn rem(&self, other: &Value) -> Value {
        if let Some(p) = Self::poison_of(self, other) {
            return p;
        }
        if other.bits == 0 {
            return Value::fault("division by zero");
        }
        let unsigned = Self::promote_unsigned(self, other);
        let bits = if unsigned {
            self.bits.wrapping_rem(other.bits)
        } else {
            (self.as_i64().wrapping_rem(other.as_i64())) as u64
        };
        Value { bits, unsigned, exception: None }
    }

    /// Bitwise AND/OR/XOR, which in C do not change signedness rules beyond
    /// the ordinary unsigned-promotion.
    #[must_use]
    pub fn bitand(&self, other: &Value) -> Value {
        Self::binary(self, other, |a, b, _| (a & b) as u64)
    }
    #[must_use]
    pub fn bitor(&self, other: &Value) -> Value {
        Self::binary(self, other, |a, b, _| (a | b) as u64)
    }
    #[must_use]
    pub fn bitxor(&self, other: &Value) -> Value {
        Self::binary(self, other, |a, b, _| (a ^ b) as u64)
    }
    /// Bitwise NOT.
    #[must_use]
    pub fn bitnot(&self) -> Value {
        if self.is_fault() {
            return self.clone();
        }
        Value { bits: !self.bits, unsigned: self.unsigned, exception: None }
    }
    /// Arithmetic negation.
    #[must_use]
    pub fn neg(&self) -> Value {
        if self.is_fault() {
            return self.clone();
        }
        Value { bits: (self.as_i64().wrapping_neg()) as u64, unsigned: self.unsigned, exception: None }
    }
    /// Logical NOT: `!x` is always a signed 0 or 1.
    #[must_use]
    pub fn not(&self) -> Value {
        if self.is_fault() {
            return self.clone();
        }
        Value::signed(i64::from(self.bits == 0))
    }

    /// Left shift. Per C, the result's signedness follows only the *left*
    /// operand, not the usual promotion rule.
    #[must_use]
    pub fn shl(&self, other: &Value) -> Value {
        if let Some(p) = Self::poison_of(self, other) {
            return p;
        }
        let shift = (other.bits % u64::from(BITS)) as u32;
        Value { bits: self.bits.wrapping_shl(shift), unsigned: self.unsigned, exception: None }
    }
    /// Right shift (arithmetic if the left operand is signed, logical if
    /// unsigned), following only the left operand's signedness.
    #[must_use]
    pub fn shr(&self, other: &Value) -> Value {
        if let Some(p) = Self::poison_of(self, other) {
            return p;
        }
        let shift = (other.bits % u64::from(BITS)) as u32;
        let bits = if self.unsigned {
            self.bits.wrapping_shr(shift)
        } else {
            (self.as_i64().wrapping_shr(shift)) as u64
        };
        Value { bits, unsigned: self.unsigned, exception: None }
    }

    fn compare(&self, other: &Value, f: impl FnOnce(i64, i64) -> bool, fu: impl FnOnce(u64, u64) -> bool) -> Value {
        if let Some(p) = Self::poison_of(self, other) {
            return p;
        }
        let result = if Self::promote_unsigned(self, other) {
            fu(self.bits, other.bits)
        } else {
            f(self.as_i64(), other.as_i64())
        };
        Value::signed(i64::from(result))
    }

    #[must_use]
    pub fn eq(&self, other: &Value) -> Value {
        self.compare(other, |a, b| a == b, |a, b| a == b)
    }
    #[must_use]
    pub fn ne(&self, other: &Value) -> Value {
        self.compare(other, |a, b| a != b, |a, b| a != b)
    }
    #[must_use]
    pub fn lt(&self, other: &Value) -> Value {
        self.compare(other, |a, b| a < b, |a, b| a < b)
    }
    #[must_use]
    pub fn le(&self, other: &Value) -> Value {
        self.compare(other, |a, b| a <= b, |a, b| a <= b)
    }
    #[must_use]
    pub fn gt(&self, other: &Value) -> Value {
        self.compare(other, |a, b| a > b, |a, b| a > b)
    }
    #[must_use]
    pub fn ge(&self, other: &Value) -> Value {
        self.compare(other, |a, b| a >= b, |a, b| a >= b)
    }

    /// Ternary result type: unsigned if either branch is unsigned, matching
    /// C's usual arithmetic conversions applied to the selected branch.
    #[must_use]
    pub fn select(cond: &Value, if_true: &Value, if_false: &Value) -> Value {
        if cond.is_fault() {
            return cond.clone();
        }
        let chosen = if cond.truthy() { if_true } else { if_false };
        if chosen.is_fault() {
            return chosen.clone();
        }
        let unsigned = if_true.unsigned || if_false.unsigned;
        Value { bits: chosen.bits, unsigned, exception: None }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.bits == other.bits
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(e) = &self.exception {
            return write!(f, "<fault: {e}>");
        }
        if self.unsigned {
            write!(f, "{}", self.bits)
        } else {
            write!(f, "{}", self.as_i64())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsigned_wraps_max_value() {
        // 18446744073709551615 == -1, per the evaluator's 64-bit width.
        let max_u = Value::unsigned(18446744073709551615);
        let neg_one = Value::signed(-1);
        assert!(max_u.eq(&neg_one).truthy());
    }

    #[test]
    fn signed_overflow_wraps() {
        let v = Value::signed(i64::MAX).add(&Value::signed(1));
        assert_eq!(v.as_i64(), i64::MIN);
    }

    #[test]
    fn unsigned_comparison_promotion() {
        // -1 >= 0U is false: -1 is reinterpreted as UINT64_MAX when compared
        // against an unsigned operand.
        let lhs = Value::signed(-1);
        let rhs = Value::unsigned(0);
        assert!(!lhs.ge(&rhs).truthy());
    }

    #[test]
    fn shift_follows_left_operand_signedness_only() {
        // -1 << 3U as unsigned-left would differ; here left is signed so
        // result stays signed despite an unsigned shift amount.
        let v = Value::signed(-1).shl(&Value::unsigned(3));
        assert!(!v.is_unsigned());
    }

    #[test]
    fn division_by_zero_faults_without_panicking() {
        let v = Value::signed(1).div(&Value::signed(0));
        assert!(v.is_fault());
    }

    #[test]
    fn ternary_promotes_to_unsigned_from_either_branch() {
        let cond = Value::signed(1);
        let result = Value::select(&cond, &Value::signed(-1), &Value::unsigned(0));
        assert!(result.is_unsigned());
    }
}
