//! `score_type!` expands a list of labelled `i64` levels into a score type.

/// Declares a score struct with one `i64` field per level.
///
/// Each level carries the label it is printed and parsed with. An empty label
/// means the level is written as a bare number.
macro_rules! score_type {
    (
        $(#[$meta:meta])*
        $name:ident { $($level:ident => $label:literal),+ }, hard_levels = $hard:expr
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub struct $name {
            $($level: i64,)+
        }

        impl $name {
            pub const ZERO: $name = $name { $($level: 0,)+ };

            #[inline]
            pub const fn of($($level: i64),+) -> Self {
                $name { $($level,)+ }
            }

            $(
                #[inline]
                pub const fn $level(&self) -> i64 {
                    self.$level
                }
            )+
        }

        impl $crate::score::Score for $name {
            const HARD_LEVELS: usize = $hard;

            #[inline]
            fn zero() -> Self {
                $name::ZERO
            }

            #[inline]
            fn scale(&self, factor: i64) -> Self {
                $name { $($level: self.$level * factor,)+ }
            }

            #[inline]
            fn checked_scale(&self, factor: i64) -> Option<Self> {
                Some($name { $($level: self.$level.checked_mul(factor)?,)+ })
            }

            #[inline]
            fn checked_add(&self, other: Self) -> Option<Self> {
                Some($name { $($level: self.$level.checked_add(other.$level)?,)+ })
            }

            #[inline]
            fn checked_sub(&self, other: Self) -> Option<Self> {
                Some($name { $($level: self.$level.checked_sub(other.$level)?,)+ })
            }

            #[inline]
            fn saturating_add(&self, other: Self) -> Self {
                $name { $($level: self.$level.saturating_add(other.$level),)+ }
            }

            fn levels(&self) -> Vec<i64> {
                vec![$(self.$level),+]
            }
        }

        impl Ord for $name {
            fn cmp(&self, other: &Self) -> std::cmp::Ordering {
                std::cmp::Ordering::Equal $(.then(self.$level.cmp(&other.$level)))+
            }
        }

        impl PartialOrd for $name {
            fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
                Some(self.cmp(other))
            }
        }

        impl std::ops::Add for $name {
            type Output = Self;

            fn add(self, other: Self) -> Self {
                $name { $($level: self.$level + other.$level,)+ }
            }
        }

        impl std::ops::Sub for $name {
            type Output = Self;

            fn sub(self, other: Self) -> Self {
                $name { $($level: self.$level - other.$level,)+ }
            }
        }

        impl std::ops::Neg for $name {
            type Output = Self;

            fn neg(self) -> Self {
                $name { $($level: -self.$level,)+ }
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_tuple(stringify!($name))$(.field(&self.$level))+.finish()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let parts: &[String] = &[$(format!("{}{}", self.$level, $label)),+];
                f.write_str(&parts.join("/"))
            }
        }

        impl $crate::score::ParseableScore for $name {
            fn parse(text: &str) -> Result<Self, $crate::score::ScoreParseError> {
                use $crate::score::ScoreParseError;

                let text = text.trim();
                let labels: &[&'static str] = &[$($label),+];
                let parts: Vec<&str> = text.split('/').map(str::trim).collect();
                if parts.len() != labels.len() {
                    return Err(ScoreParseError::LevelCount {
                        score: stringify!($name),
                        text: text.to_string(),
                        found: parts.len(),
                        expected: labels.len(),
                    });
                }
                let mut values = parts.iter().zip(labels.iter().copied()).map(|(part, label)| {
                    let digits = part.strip_suffix(label).ok_or_else(|| ScoreParseError::MissingLabel {
                        score: stringify!($name),
                        part: part.to_string(),
                        label,
                    })?;
                    digits.parse::<i64>().map_err(|_| ScoreParseError::NotAnInteger {
                        score: stringify!($name),
                        part: part.to_string(),
                    })
                });
                Ok($name {
                    $($level: match values.next() {
                        Some(value) => value?,
                        None => 0,
                    },)+
                })
            }
        }
    };
}
