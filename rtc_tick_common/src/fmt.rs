//! Logging facade: `defmt` on the device, `log` on the host, nothing otherwise.
#![allow(unused_macros)]

#[cfg(feature = "defmt")]
macro_rules! trace {
    ($($t:tt)*) => { ::defmt::trace!($($t)*) };
}
#[cfg(all(feature = "log", not(feature = "defmt")))]
macro_rules! trace {
    ($($t:tt)*) => { ::log::trace!($($t)*) };
}
#[cfg(not(any(feature = "log", feature = "defmt")))]
macro_rules! trace {
    ($($t:tt)*) => {{ if false { let _ = ::core::format_args!($($t)*); } }};
}

#[cfg(feature = "defmt")]
macro_rules! debug {
    ($($t:tt)*) => { ::defmt::debug!($($t)*) };
}
#[cfg(all(feature = "log", not(feature = "defmt")))]
macro_rules! debug {
    ($($t:tt)*) => { ::log::debug!($($t)*) };
}
#[cfg(not(any(feature = "log", feature = "defmt")))]
macro_rules! debug {
    ($($t:tt)*) => {{ if false { let _ = ::core::format_args!($($t)*); } }};
}

#[cfg(feature = "defmt")]
macro_rules! info {
    ($($t:tt)*) => { ::defmt::info!($($t)*) };
}
#[cfg(all(feature = "log", not(feature = "defmt")))]
macro_rules! info {
    ($($t:tt)*) => { ::log::info!($($t)*) };
}
#[cfg(not(any(feature = "log", feature = "defmt")))]
macro_rules! info {
    ($($t:tt)*) => {{ if false { let _ = ::core::format_args!($($t)*); } }};
}

#[cfg(feature = "defmt")]
macro_rules! warn {
    ($($t:tt)*) => { ::defmt::warn!($($t)*) };
}
#[cfg(all(feature = "log", not(feature = "defmt")))]
macro_rules! warn {
    ($($t:tt)*) => { ::log::warn!($($t)*) };
}
#[cfg(not(any(feature = "log", feature = "defmt")))]
macro_rules! warn {
    ($($t:tt)*) => {{ if false { let _ = ::core::format_args!($($t)*); } }};
}
