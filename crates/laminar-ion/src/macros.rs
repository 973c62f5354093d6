/// Generates `FromStr` and `Display` impls for simple string enums.
///
/// `str_enum!(Enum, "config.key", "msg", Variant => "canonical", "alias"; ...)`
///
/// Parsing is case-insensitive and treats `-` as `_`. A failed parse is an
/// [`IonSerdeError::InvalidConfiguration`](crate::error::IonSerdeError)
/// naming `config.key`.
macro_rules! str_enum {
    ($enum_name:ident, $key:literal, $err_msg:literal,
        $( $variant:ident => $display:literal $(, $alias:literal)* );+ $(;)?
    ) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let s = match self {
                    $( Self::$variant => $display, )+
                };
                f.write_str(s)
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = crate::error::IonSerdeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let normalized = s.trim().to_lowercase().replace('-', "_");
                match normalized.as_str() {
                    $( $display $(| $alias)* => Ok(Self::$variant), )+
                    other => Err(crate::error::IonSerdeError::config(
                        $key,
                        format!("{}: '{}'", $err_msg, other),
                    )),
                }
            }
        }
    };
}
