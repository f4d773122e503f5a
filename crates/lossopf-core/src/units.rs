//! Unit newtypes for the quantities that cross the per-unit boundary.
//!
//! The dispatch model works entirely in per-unit on the system power base,
//! while entity data and reports are in MW, MWh and degrees. Keeping the two
//! sides in distinct types makes every conversion an explicit call:
//!
//! ```
//! use lossopf_core::units::{MegavoltAmperes, Megawatts};
//!
//! let base = MegavoltAmperes(100.0);
//! let demand = Megawatts(10.0);
//! assert!((demand.to_per_unit(base).value() - 0.1).abs() < 1e-12);
//! ```
//!
//! Energy is converted with the same base and an implicit one-hour period,
//! so 1 pu of energy is `base_mva` MWh.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub};

macro_rules! unit_newtype {
    ($type:ident, $symbol:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        #[repr(transparent)]
        pub struct $type(pub f64);

        impl $type {
            #[inline]
            pub const fn new(value: f64) -> Self {
                Self(value)
            }

            #[inline]
            pub const fn value(self) -> f64 {
                self.0
            }

            #[inline]
            pub fn abs(self) -> Self {
                Self(self.0.abs())
            }

            #[inline]
            pub fn is_finite(self) -> bool {
                self.0.is_finite()
            }

            #[inline]
            pub fn min(self, other: Self) -> Self {
                Self(self.0.min(other.0))
            }

            #[inline]
            pub fn max(self, other: Self) -> Self {
                Self(self.0.max(other.0))
            }
        }

        impl Add for $type {
            type Output = Self;
            fn add(self, rhs: Self) -> Self {
                Self(self.0 + rhs.0)
            }
        }

        impl AddAssign for $type {
            fn add_assign(&mut self, rhs: Self) {
                self.0 += rhs.0;
            }
        }

        impl Sub for $type {
            type Output = Self;
            fn sub(self, rhs: Self) -> Self {
                Self(self.0 - rhs.0)
            }
        }

        impl Neg for $type {
            type Output = Self;
            fn neg(self) -> Self {
                Self(-self.0)
            }
        }

        impl Mul<f64> for $type {
            type Output = Self;
            fn mul(self, rhs: f64) -> Self {
                Self(self.0 * rhs)
            }
        }

        impl Div<f64> for $type {
            type Output = Self;
            fn div(self, rhs: f64) -> Self {
                Self(self.0 / rhs)
            }
        }

        impl std::fmt::Display for $type {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{:.4} {}", self.0, $symbol)
            }
        }

        impl std::iter::Sum for $type {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                Self(iter.map(|x| x.0).sum())
            }
        }
    };
}

unit_newtype!(Megawatts, "MW");
unit_newtype!(MegawattHours, "MWh");
unit_newtype!(MegavoltAmperes, "MVA");
unit_newtype!(PerUnit, "pu");
unit_newtype!(Radians, "rad");
unit_newtype!(Degrees, "°");

impl Megawatts {
    /// Per-unit power on the given system base.
    #[inline]
    pub fn to_per_unit(self, base: MegavoltAmperes) -> PerUnit {
        if base.0.abs() < 1e-12 {
            PerUnit(0.0)
        } else {
            PerUnit(self.0 / base.0)
        }
    }
}

impl MegawattHours {
    /// Per-unit energy for a one-hour period on the given base.
    #[inline]
    pub fn to_per_unit(self, base: MegavoltAmperes) -> PerUnit {
        if base.0.abs() < 1e-12 {
            PerUnit(0.0)
        } else {
            PerUnit(self.0 / base.0)
        }
    }
}

impl PerUnit {
    pub const ZERO: Self = Self(0.0);
    pub const ONE: Self = Self(1.0);

    #[inline]
    pub fn to_megawatts(self, base: MegavoltAmperes) -> Megawatts {
        Megawatts(self.0 * base.0)
    }

    #[inline]
    pub fn to_megawatt_hours(self, base: MegavoltAmperes) -> MegawattHours {
        MegawattHours(self.0 * base.0)
    }
}

impl MegavoltAmperes {
    /// Convert a $/MWh coefficient into $/h per pu of output.
    #[inline]
    pub fn cost_to_per_unit(self, cost_per_mwh: f64) -> f64 {
        cost_per_mwh * self.0
    }
}

impl Radians {
    pub const ZERO: Self = Self(0.0);
    pub const PI: Self = Self(std::f64::consts::PI);

    #[inline]
    pub fn to_degrees(self) -> Degrees {
        Degrees(self.0.to_degrees())
    }
}

impl Degrees {
    #[inline]
    pub fn to_radians(self) -> Radians {
        Radians(self.0.to_radians())
    }
}
