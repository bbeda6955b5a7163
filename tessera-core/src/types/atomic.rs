use std::sync::atomic::{
    AtomicBool, AtomicI16, AtomicI32, AtomicI64, AtomicI8, AtomicIsize, AtomicU16, AtomicU32,
    AtomicU64, AtomicU8, AtomicUsize, Ordering,
};

use crate::error::CodecError;
use crate::traverse::{Deserializer, Load, Save, Serializer};

// Atomics travel as their plain value; a load stores the decoded value once
// the read has fully succeeded.
macro_rules! atomic {
    ($($atomic:ty => $plain:ty;)*) => {$(
        impl Save for $atomic {
            const MINIMAL: bool = true;

            #[inline]
            fn save<S: Serializer>(&self, s: &mut S) -> Result<(), CodecError> {
                <$atomic>::load(self, Ordering::SeqCst).save(s)
            }
        }

        impl Load for $atomic {
            fn load<D: Deserializer>(&mut self, d: &mut D) -> Result<(), CodecError> {
                let mut value = <$plain>::default();
                Load::load(&mut value, d)?;
                self.store(value, Ordering::SeqCst);
                Ok(())
            }
        }
    )*};
}

atomic! {
    AtomicBool => bool;
    AtomicI8 => i8;
    AtomicI16 => i16;
    AtomicI32 => i32;
    AtomicI64 => i64;
    AtomicIsize => isize;
    AtomicU8 => u8;
    AtomicU16 => u16;
    AtomicU32 => u32;
    AtomicU64 => u64;
    AtomicUsize => usize;
}
