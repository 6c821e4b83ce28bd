//! Helper macro for declaring port error enums.
//!
//! Each variant gets a `thiserror` message and a snake-case constructor whose
//! parameters accept `impl Into<T>`, so call sites can pass `&str` for
//! `String` fields.

macro_rules! define_port_error {
    (
        $(#[$outer:meta])*
        pub enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident $( { $($field:ident : $ty:ty),* $(,)? } )? => $message:expr
            ),* $(,)?
        }
    ) => {
        $(#[$outer])*
        #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                #[error($message)]
                $variant $( { $($field : $ty),* } )?,
            )*
        }

        impl $name {
            $(
                define_port_error!(@constructor $variant $( { $($field : $ty),* } )?);
            )*
        }
    };

    (@constructor $variant:ident) => {
        ::paste::paste! {
            #[doc = "Build the `" $variant "` variant."]
            pub fn [<$variant:snake>]() -> Self {
                Self::$variant
            }
        }
    };

    (@constructor $variant:ident { $($field:ident : $ty:ty),* }) => {
        ::paste::paste! {
            #[doc = "Build the `" $variant "` variant."]
            pub fn [<$variant:snake>]($($field: impl Into<$ty>),*) -> Self {
                Self::$variant { $($field: $field.into()),* }
            }
        }
    };
}

pub(crate) use define_port_error;

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.

    define_port_error! {
        pub enum ProbePortError {
            Offline => "probe offline",
            Refused { message: String } => "probe refused: {message}",
            Status { status: u16, message: String } => "probe status {status}: {message}",
        }
    }

    #[test]
    fn unit_variants_get_constructors() {
        assert_eq!(ProbePortError::offline().to_string(), "probe offline");
    }

    #[test]
    fn constructors_accept_str_for_string_fields() {
        let err = ProbePortError::refused("connection reset");
        assert_eq!(err.to_string(), "probe refused: connection reset");
    }

    #[test]
    fn constructors_support_mixed_fields() {
        let err = ProbePortError::status(503_u16, "maintenance");
        assert_eq!(err.to_string(), "probe status 503: maintenance");
    }
}
