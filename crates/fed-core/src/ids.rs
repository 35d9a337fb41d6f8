//! Strongly typed identifier wrappers.
//!
//! Every entity crossing the simulator boundary is named by an opaque string
//! chosen by the scenario or the coordination runtime, so the wrappers hold a
//! `String` rather than an integer index.  `Borrow<str>` is implemented so
//! hash-map lookups can use `&str` keys without allocating.

use std::borrow::Borrow;
use std::fmt;

/// Generate a typed ID wrapper around an owned string.
macro_rules! string_id {
    ($(#[$attr:meta])* $vis:vis struct $name:ident;) => {
        $(#[$attr])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
        #[derive(serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        $vis struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            #[inline]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl Borrow<str> for $name {
            #[inline]
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id! {
    /// Name of a vehicle, unique across the whole federation.
    pub struct VehicleId;
}

string_id! {
    /// Name of a vehicle type as declared during type initialization.
    pub struct VehicleTypeId;
}

string_id! {
    /// Name of a route known to the simulator and/or the federation.
    pub struct RouteId;
}

string_id! {
    /// Name of a road-network connection (edge).  Edge ids starting with `:`
    /// denote internal junction edges.
    pub struct EdgeId;
}

string_id! {
    /// Name of a stationary detector (induction loop or lane-area detector).
    pub struct DetectorId;
}

string_id! {
    /// Name of a traffic-signal group (one controlled junction).
    pub struct SignalGroupId;
}

string_id! {
    /// Name of a federate participating in the federation.
    pub struct FederateId;
}

impl EdgeId {
    /// Internal junction edges carry no usable road position; the last
    /// position on a regular edge is kept instead.
    #[inline]
    pub fn is_internal(&self) -> bool {
        self.0.starts_with(':')
    }
}
