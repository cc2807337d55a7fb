//! Locale-dependent rendering of numbers, money and dates.

use std::fmt::Write;

use chrono::NaiveDateTime;
use derive_setters::Setters;

use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Eq, Setters)]
#[setters(into)]
pub struct LocaleFormat {
    pub locale: String,
    pub currency_code: String,
    pub currency_symbol: String,
    /// `1 000,00 ₽` instead of `$1,000.00`
    pub symbol_after: bool,
    pub thousands_separator: String,
    pub decimal_separator: String,
    /// chrono strftime pattern
    pub date_pattern: String,
}

impl Default for LocaleFormat {
    fn default() -> Self {
        Self::ru_ru()
    }
}

impl LocaleFormat {
    pub fn ru_ru() -> Self {
        Self {
            locale: "ru-RU".to_string(),
            currency_code: "RUB".to_string(),
            currency_symbol: "₽".to_string(),
            symbol_after: true,
            thousands_separator: "\u{a0}".to_string(),
            decimal_separator: ",".to_string(),
            date_pattern: "%d.%m.%Y".to_string(),
        }
    }

    pub fn en_us() -> Self {
        Self {
            locale: "en-US".to_string(),
            currency_code: "USD".to_string(),
            currency_symbol: "$".to_string(),
            symbol_after: false,
            thousands_separator: ",".to_string(),
            decimal_separator: ".".to_string(),
            date_pattern: "%m/%d/%Y".to_string(),
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "ru" | "ru-ru" | "ru_ru" => Some(Self::ru_ru()),
            "en" | "en-us" | "en_us" => Some(Self::en_us()),
            _ => None,
        }
    }

    pub fn format_number(&self, value: f64, decimals: usize) -> String {
        if !value.is_finite() {
            return Value::Number(value).to_string();
        }
        let fixed = format!("{:.*}", decimals, value.abs());
        let (int_part, frac_part) = match fixed.split_once('.') {
            Some((i, f)) => (i, Some(f)),
            None => (fixed.as_str(), None),
        };

        let digits: Vec<char> = int_part.chars().collect();
        let mut out = String::new();
        if value < 0.0 && fixed.chars().any(|c| c != '0' && c != '.') {
            out.push('-');
        }
        for (idx, digit) in digits.iter().enumerate() {
            if idx > 0 && (digits.len() - idx) % 3 == 0 {
                out.push_str(&self.thousands_separator);
            }
            out.push(*digit);
        }
        if let Some(frac) = frac_part {
            out.push_str(&self.decimal_separator);
            out.push_str(frac);
        }
        out
    }

    pub fn format_currency(&self, value: f64) -> String {
        let amount = self.format_number(value, 2);
        if self.symbol_after {
            format!("{amount}\u{a0}{}", self.currency_symbol)
        } else {
            format!("{}{amount}", self.currency_symbol)
        }
    }

    pub fn format_date(&self, date: NaiveDateTime) -> String {
        let mut out = String::new();
        // An invalid pattern makes chrono's Display fail.
        if write!(out, "{}", date.format(&self.date_pattern)).is_err() {
            return Value::Date(date).to_string();
        }
        out
    }

    pub fn format_value(&self, value: &Value) -> String {
        match value.as_date() {
            Some(date) => self.format_date(date),
            None => value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 2, 29)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn ru_currency() {
        let ru = LocaleFormat::ru_ru();
        assert_eq!(ru.format_currency(1234567.891), "1\u{a0}234\u{a0}567,89\u{a0}₽");
        assert_eq!(ru.format_currency(-50.0), "-50,00\u{a0}₽");
        assert_eq!(ru.format_date(date()), "29.02.2024");
    }

    #[test]
    fn en_currency() {
        let en = LocaleFormat::en_us();
        assert_eq!(en.format_currency(1234.5), "$1,234.50");
        assert_eq!(en.format_number(999.0, 0), "999");
        assert_eq!(en.format_number(1000.0, 0), "1,000");
        assert_eq!(en.format_date(date()), "02/29/2024");
    }

    #[test]
    fn negative_zero_has_no_sign() {
        assert_eq!(LocaleFormat::en_us().format_number(-0.001, 2), "0.00");
    }

    #[test]
    fn setters_override_preset() {
        let custom = LocaleFormat::en_us()
            .currency_symbol("€")
            .symbol_after(true)
            .date_pattern("%Y-%m-%d");
        assert_eq!(custom.format_currency(10.0), "10.00\u{a0}€");
        assert_eq!(custom.format_value(&Value::Date(date())), "2024-02-29");
        assert_eq!(custom.format_value(&Value::Number(7.0)), "7");
    }

    #[test]
    fn bad_pattern_falls_back() {
        let broken = LocaleFormat::ru_ru().date_pattern("%Q");
        assert_eq!(broken.format_date(date()), "2024-02-29 00:00:00");
    }

    #[test]
    fn tags() {
        assert_eq!(LocaleFormat::from_tag("en-US"), Some(LocaleFormat::en_us()));
        assert_eq!(LocaleFormat::from_tag("RU"), Some(LocaleFormat::ru_ru()));
        assert_eq!(LocaleFormat::from_tag("de-DE"), None);
    }
}
