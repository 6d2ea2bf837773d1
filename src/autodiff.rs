//! Fixed-width forward-mode automatic differentiation.
//!
//! A [`Dual`] carries a value together with its exact partial derivatives
//! along `N` independent directions. The direction count is a compile-time
//! parameter of the type, so the AD width is always a local, inspectable
//! property of the computation rather than ambient process state.
//!
//! The constraint resolver seeds exactly three directions per hanging-node
//! equation (the hanging node itself and its two interpolation supports), for
//! which the [`Dual3`] alias is provided.

use nalgebra::RealField;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// A dual number with `N` derivative components.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dual<T, const N: usize> {
    value: T,
    derivatives: [T; N],
}

/// The AD width used by hanging-node constraint equations.
pub type Dual3<T> = Dual<T, 3>;

impl<T: RealField + Copy, const N: usize> Dual<T, N> {
    /// A quantity with no dependence on any seeded direction.
    pub fn constant(value: T) -> Self {
        Self {
            value,
            derivatives: [T::zero(); N],
        }
    }

    /// An independent variable seeded along the given direction, i.e. with
    /// derivative 1 in `direction` and 0 elsewhere.
    ///
    /// # Panics
    ///
    /// Panics if `direction >= N`.
    pub fn variable(value: T, direction: usize) -> Self {
        assert!(
            direction < N,
            "seed direction {} out of range for AD width {}",
            direction,
            N
        );
        let mut derivatives = [T::zero(); N];
        derivatives[direction] = T::one();
        Self { value, derivatives }
    }

    pub fn value(&self) -> T {
        self.value
    }

    pub fn derivatives(&self) -> &[T; N] {
        &self.derivatives
    }

    pub fn derivative(&self, direction: usize) -> T {
        self.derivatives[direction]
    }

    /// Multiply by a plain scalar.
    pub fn scale(mut self, alpha: T) -> Self {
        self.value *= alpha;
        for d in &mut self.derivatives {
            *d *= alpha;
        }
        self
    }
}

impl<T: RealField + Copy, const N: usize> Add for Dual<T, N> {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self.value += rhs.value;
        for (d, rd) in self.derivatives.iter_mut().zip(&rhs.derivatives) {
            *d += *rd;
        }
        self
    }
}

impl<T: RealField + Copy, const N: usize> Sub for Dual<T, N> {
    type Output = Self;

    fn sub(mut self, rhs: Self) -> Self {
        self.value -= rhs.value;
        for (d, rd) in self.derivatives.iter_mut().zip(&rhs.derivatives) {
            *d -= *rd;
        }
        self
    }
}

impl<T: RealField + Copy, const N: usize> Neg for Dual<T, N> {
    type Output = Self;

    fn neg(mut self) -> Self {
        self.value = -self.value;
        for d in &mut self.derivatives {
            *d = -*d;
        }
        self
    }
}

impl<T: RealField + Copy, const N: usize> Mul for Dual<T, N> {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        let mut derivatives = [T::zero(); N];
        for (i, d) in derivatives.iter_mut().enumerate() {
            *d = self.derivatives[i] * rhs.value + self.value * rhs.derivatives[i];
        }
        Self {
            value: self.value * rhs.value,
            derivatives,
        }
    }
}

impl<T: RealField + Copy, const N: usize> Div for Dual<T, N> {
    type Output = Self;

    fn div(self, rhs: Self) -> Self {
        let denom = rhs.value * rhs.value;
        let mut derivatives = [T::zero(); N];
        for (i, d) in derivatives.iter_mut().enumerate() {
            *d = (self.derivatives[i] * rhs.value - self.value * rhs.derivatives[i]) / denom;
        }
        Self {
            value: self.value / rhs.value,
            derivatives,
        }
    }
}

impl<T: RealField + Copy, const N: usize> Add<T> for Dual<T, N> {
    type Output = Self;

    fn add(mut self, rhs: T) -> Self {
        self.value += rhs;
        self
    }
}

impl<T: RealField + Copy, const N: usize> Sub<T> for Dual<T, N> {
    type Output = Self;

    fn sub(mut self, rhs: T) -> Self {
        self.value -= rhs;
        self
    }
}

impl<T: RealField + Copy, const N: usize> Mul<T> for Dual<T, N> {
    type Output = Self;

    fn mul(self, rhs: T) -> Self {
        self.scale(rhs)
    }
}

impl<T: RealField + Copy, const N: usize> Div<T> for Dual<T, N> {
    type Output = Self;

    fn div(self, rhs: T) -> Self {
        self.scale(T::one() / rhs)
    }
}
