//! Parse configuration for value types
//!
//! Locale symbols and null aliases are explicit, passed-in state; there is no
//! process-wide configuration singleton in the core.

/// Strings treated as null by every value type, compared case-insensitively.
pub const DEFAULT_NULL_VALUES: &[&str] = &["", "n/a", "none", "null", "nan", "na"];

/// Currency symbols stripped before numeric parsing.
pub const DEFAULT_CURRENCY_SYMBOLS: &[&str] = &["$", "£", "€", "¥", "₹"];

/// Options controlling how raw text is coerced into typed values.
#[derive(Debug, Clone)]
pub struct TypeOptions {
    /// Case-insensitive aliases for the null value.
    pub null_values: Vec<String>,
    /// Digit-grouping symbol for numbers (e.g. "," in en_US).
    pub group_symbol: String,
    /// Decimal separator for numbers (e.g. "." in en_US).
    pub decimal_symbol: String,
    /// Currency symbols stripped from numeric input.
    pub currency_symbols: Vec<String>,
}

impl Default for TypeOptions {
    fn default() -> Self {
        Self {
            null_values: DEFAULT_NULL_VALUES.iter().map(|s| s.to_string()).collect(),
            group_symbol: ",".to_string(),
            decimal_symbol: ".".to_string(),
            currency_symbols: DEFAULT_CURRENCY_SYMBOLS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl TypeOptions {
    /// Replace the null-alias set.
    pub fn with_null_values(mut self, values: Vec<String>) -> Self {
        self.null_values = values;
        self
    }

    /// Set the digit-grouping symbol.
    pub fn with_group_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.group_symbol = symbol.into();
        self
    }

    /// Set the decimal separator.
    pub fn with_decimal_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.decimal_symbol = symbol.into();
        self
    }

    /// Replace the currency-symbol set.
    pub fn with_currency_symbols(mut self, symbols: Vec<String>) -> Self {
        self.currency_symbols = symbols;
        self
    }

    /// Check whether a raw string is a null alias.
    pub fn is_null(&self, raw: &str) -> bool {
        let trimmed = raw.trim();
        self.null_values
            .iter()
            .any(|n| n.eq_ignore_ascii_case(trimmed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_null_aliases() {
        let options = TypeOptions::default();
        assert!(options.is_null(""));
        assert!(options.is_null("  NULL "));
        assert!(options.is_null("N/A"));
        assert!(!options.is_null("0"));
    }

    #[test]
    fn test_custom_null_aliases() {
        let options = TypeOptions::default().with_null_values(vec!["missing".to_string()]);
        assert!(options.is_null("MISSING"));
        assert!(!options.is_null(""));
    }
}
