//! Naming policies applied to property names and dictionary keys.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

/// Which names a [`NamingStrategy`] applies to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NamingOptions {
    pub process_dictionary_keys: bool,
    /// Also rename properties whose name was given explicitly.
    pub override_specified_names: bool,
    pub process_extension_data_names: bool,
}

/// Maps member names to the names written to the document.
pub trait NamingStrategy: Send + Sync + fmt::Debug {
    fn options(&self) -> NamingOptions;

    /// Converts a name unconditionally.
    fn convert(&self, name: &str) -> String;

    fn property_name(&self, name: &str, has_specified_name: bool) -> String {
        if has_specified_name && !self.options().override_specified_names {
            return String::from(name);
        }
        self.convert(name)
    }

    fn dictionary_key(&self, key: &str) -> String {
        if self.options().process_dictionary_keys {
            self.convert(key)
        } else {
            String::from(key)
        }
    }

    fn extension_data_name(&self, name: &str) -> String {
        if self.options().process_extension_data_names {
            self.convert(name)
        } else {
            String::from(name)
        }
    }
}

// -----------------------------------------------------------------------------
// Strategies

macro_rules! define_strategy {
    ($(#[$meta:meta])* $name:ident => $convert:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct $name {
            pub options: NamingOptions,
        }

        impl $name {
            #[inline]
            pub const fn new(options: NamingOptions) -> Self {
                Self { options }
            }
        }

        impl NamingStrategy for $name {
            #[inline]
            fn options(&self) -> NamingOptions {
                self.options
            }

            #[inline]
            fn convert(&self, name: &str) -> String {
                $convert(name)
            }
        }
    };
}

define_strategy!(
    /// Keeps names unchanged.
    DefaultNamingStrategy => String::from
);

define_strategy!(
    /// `FirstName` becomes `firstName`, `URLValue` becomes `urlValue`.
    CamelCaseNamingStrategy => to_camel_case
);

define_strategy!(
    /// `FirstName` becomes `first_name`.
    SnakeCaseNamingStrategy => |name: &str| to_separated_case(name, '_')
);

define_strategy!(
    /// `FirstName` becomes `first-name`.
    KebabCaseNamingStrategy => |name: &str| to_separated_case(name, '-')
);

// -----------------------------------------------------------------------------
// Conversions

/// Lowercases the leading run of capitals, keeping the capital that starts
/// the next word.
pub fn to_camel_case(name: &str) -> String {
    let mut chars: Vec<char> = name.chars().collect();
    if chars.first().is_none_or(|c| !c.is_uppercase()) {
        return String::from(name);
    }

    for i in 0..chars.len() {
        if i == 1 && !chars[i].is_uppercase() {
            break;
        }
        let has_next = i + 1 < chars.len();
        if i > 0 && has_next && !chars[i + 1].is_uppercase() {
            // a separator ends the acronym, the capital before it belongs to it
            if chars[i + 1] == ' ' {
                chars[i] = lower(chars[i]);
            }
            break;
        }
        chars[i] = lower(chars[i]);
    }
    chars.into_iter().collect()
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum SeparatedState {
    Start,
    Lower,
    Upper,
    NewWord,
}

/// Splits words at case changes and spaces and joins them lowercased with
/// `separator`.
pub fn to_separated_case(name: &str, separator: char) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    let mut state = SeparatedState::Start;

    for (i, &c) in chars.iter().enumerate() {
        if c == ' ' {
            if state != SeparatedState::Start {
                state = SeparatedState::NewWord;
            }
        } else if c.is_uppercase() {
            match state {
                SeparatedState::Upper => {
                    if let Some(&next) = chars.get(i + 1)
                        && i > 0
                        && !next.is_uppercase()
                        && next != separator
                    {
                        out.push(separator);
                    }
                }
                SeparatedState::Lower | SeparatedState::NewWord => out.push(separator),
                SeparatedState::Start => {}
            }
            out.push(lower(c));
            state = SeparatedState::Upper;
        } else if c == separator {
            out.push(separator);
            state = SeparatedState::Start;
        } else {
            if state == SeparatedState::NewWord {
                out.push(separator);
            }
            out.push(c);
            state = SeparatedState::Lower;
        }
    }
    out
}

#[inline]
fn lower(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

/// Compares two names ignoring case, the fallback used when matching
/// document properties to members.
pub fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.chars().flat_map(char::to_lowercase).eq(b.chars().flat_map(char::to_lowercase))
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::{
        CamelCaseNamingStrategy, NamingOptions, NamingStrategy, SnakeCaseNamingStrategy,
        to_camel_case, to_separated_case,
    };

    #[test]
    fn camel_case() {
        assert_eq!(to_camel_case("Name"), "name");
        assert_eq!(to_camel_case("URLValue"), "urlValue");
        assert_eq!(to_camel_case("ID"), "id");
        assert_eq!(to_camel_case("iPhone"), "iPhone");
        assert_eq!(to_camel_case("IsCIA"), "isCIA");
        assert_eq!(to_camel_case(""), "");
    }

    #[test]
    fn snake_and_kebab_case() {
        assert_eq!(to_separated_case("FirstName", '_'), "first_name");
        assert_eq!(to_separated_case("URLValue", '_'), "url_value");
        assert_eq!(to_separated_case("Already_Snake", '_'), "already_snake");
        assert_eq!(to_separated_case("Two Words", '-'), "two-words");
    }

    #[test]
    fn specified_names_are_kept_unless_overridden() {
        let keep = CamelCaseNamingStrategy::default();
        assert_eq!(keep.property_name("Explicit", true), "Explicit");
        assert_eq!(keep.property_name("Implicit", false), "implicit");
        assert_eq!(keep.dictionary_key("Key"), "Key");

        let all = SnakeCaseNamingStrategy::new(NamingOptions {
            process_dictionary_keys: true,
            override_specified_names: true,
            process_extension_data_names: false,
        });
        assert_eq!(all.property_name("Explicit", true), "explicit");
        assert_eq!(all.dictionary_key("MyKey"), "my_key");
    }
}
