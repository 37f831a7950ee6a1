//! Business sagas built on the collaborator traits.

pub mod issuance;
pub mod liquidation;
pub mod trading;

use crate::error::FlowError;

/// Declares a zero-sized step struct generic over its providers.
macro_rules! provider_step {
    ($(#[$meta:meta])* $name:ident<$($provider:ident),+>) => {
        $(#[$meta])*
        pub struct $name<$($provider),+> {
            _marker: std::marker::PhantomData<fn() -> ($($provider,)+)>,
        }

        impl<$($provider),+> $name<$($provider),+> {
            #[must_use]
            pub fn new() -> Self {
                Self {
                    _marker: std::marker::PhantomData,
                }
            }
        }

        impl<$($provider),+> Default for $name<$($provider),+> {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

pub(crate) use provider_step;

pub(crate) fn missing(step: &'static str, field: &'static str) -> FlowError {
    FlowError::MissingStepData { step, field }
}
