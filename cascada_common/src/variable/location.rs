use ::core::fmt::Display;
use ::std::sync::Arc;

use ::parking_lot::Mutex;
use ::serde_json::Number;

use super::ScalarType;

/// Shared handle to one scalar value owned by worker code.
///
/// Cloning a slot aliases the same value: a variable store keeps a clone,
/// the worker keeps the original, and both see every write.
#[derive(Debug, Default)]
pub struct Slot<T> {
    value: Arc<Mutex<T>>,
}

impl<T: Copy> Slot<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: Arc::new(Mutex::new(value)),
        }
    }

    pub fn get(&self) -> T {
        *self.value.lock()
    }

    pub fn set(&self, value: T) {
        *self.value.lock() = value;
    }
}

impl<T> Slot<T> {
    /// Whether both handles point at the same storage.
    pub fn aliases(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
        }
    }
}

/// Storage location of a variable, tagged with its scalar kind.
/// The variant is the type, so the two can never disagree.
#[derive(Debug, Clone)]
pub enum Location {
    U8(Slot<u8>),
    U32(Slot<u32>),
    U64(Slot<u64>),
    Float(Slot<f32>),
    Double(Slot<f64>),
    I32(Slot<i32>),
    I64(Slot<i64>),
}

macro_rules! location_from_slot {
    ($ty: ty, $variant: ident) => {
        impl From<Slot<$ty>> for Location {
            fn from(slot: Slot<$ty>) -> Self {
                Self::$variant(slot)
            }
        }

        impl From<&Slot<$ty>> for Location {
            fn from(slot: &Slot<$ty>) -> Self {
                Self::$variant(slot.clone())
            }
        }
    };
}

location_from_slot!(u8, U8);
location_from_slot!(u32, U32);
location_from_slot!(u64, U64);
location_from_slot!(f32, Float);
location_from_slot!(f64, Double);
location_from_slot!(i32, I32);
location_from_slot!(i64, I64);

impl Location {
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            Self::U8(_) => ScalarType::U8,
            Self::U32(_) => ScalarType::U32,
            Self::U64(_) => ScalarType::U64,
            Self::Float(_) => ScalarType::Float,
            Self::Double(_) => ScalarType::Double,
            Self::I32(_) => ScalarType::I32,
            Self::I64(_) => ScalarType::I64,
        }
    }

    /// Current value widened to a double.
    pub fn to_f64(&self) -> f64 {
        match self {
            Self::U8(slot) => f64::from(slot.get()),
            Self::U32(slot) => f64::from(slot.get()),
            Self::U64(slot) => slot.get() as f64,
            Self::Float(slot) => f64::from(slot.get()),
            Self::Double(slot) => slot.get(),
            Self::I32(slot) => f64::from(slot.get()),
            Self::I64(slot) => slot.get() as f64,
        }
    }

    /// Write a JSON number into the location, narrowed to its scalar kind.
    ///
    /// Floating kinds keep the floating value. Integer kinds take the exact
    /// integer when the number is integral, the double truncated toward zero
    /// otherwise, and then wrap to the target width (300 into a `u8` is 44).
    pub fn store_number(&self, number: &Number) {
        let double = number.as_f64().unwrap_or_default();
        let integral = number
            .as_i64()
            .map(i128::from)
            .or_else(|| number.as_u64().map(i128::from))
            .unwrap_or(double as i128);
        match self {
            Self::U8(slot) => slot.set(integral as u8),
            Self::U32(slot) => slot.set(integral as u32),
            Self::U64(slot) => slot.set(integral as u64),
            Self::Float(slot) => slot.set(double as f32),
            Self::Double(slot) => slot.set(double),
            Self::I32(slot) => slot.set(integral as i32),
            Self::I64(slot) => slot.set(integral as i64),
        }
    }

    /// Whether both locations point at the same storage.
    pub fn aliases(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::U8(a), Self::U8(b)) => a.aliases(b),
            (Self::U32(a), Self::U32(b)) => a.aliases(b),
            (Self::U64(a), Self::U64(b)) => a.aliases(b),
            (Self::Float(a), Self::Float(b)) => a.aliases(b),
            (Self::Double(a), Self::Double(b)) => a.aliases(b),
            (Self::I32(a), Self::I32(b)) => a.aliases(b),
            (Self::I64(a), Self::I64(b)) => a.aliases(b),
            _ => false,
        }
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::U8(slot) => write!(f, "{}", slot.get()),
            Self::U32(slot) => write!(f, "{}", slot.get()),
            Self::U64(slot) => write!(f, "{}", slot.get()),
            Self::Float(slot) => write!(f, "{:.6}", slot.get()),
            Self::Double(slot) => write!(f, "{:.6}", slot.get()),
            Self::I32(slot) => write!(f, "{}", slot.get()),
            Self::I64(slot) => write!(f, "{}", slot.get()),
        }
    }
}
