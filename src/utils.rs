/// 将字符串转换为可打印的 7-bit ASCII，其他字符替换为 '_'
pub fn to_ascii(s: &str) -> String {
    s.chars()
        .map(|c| if (' '..='~').contains(&c) { c } else { '_' })
        .collect()
}

/// 将文本左对齐写入定长字段，空格填充，超长截断
pub fn put_text(field: &mut [u8], s: &str) {
    field.fill(b' ');
    let ascii = to_ascii(s);
    let bytes = ascii.as_bytes();
    let len = bytes.len().min(field.len());
    field[..len].copy_from_slice(&bytes[..len]);
}

/// 将数值写入定长字段
pub fn put_number(field: &mut [u8], value: f64) {
    let text = format_number(value, field.len());
    put_text(field, &text);
}

/// 将整数写入定长字段
pub fn put_integer(field: &mut [u8], value: i64) {
    put_text(field, &value.to_string());
}

/// Renders `value` as decimal ASCII no wider than `width`.
///
/// The shortest round-trip representation is used when it fits. Otherwise the
/// number of fraction digits is reduced until it does, and as a last resort
/// the text is cut at `width` characters.
pub fn format_number(value: f64, width: usize) -> String {
    if !value.is_finite() || value == 0.0 {
        return "0".to_string();
    }

    let shortest = format!("{}", value);
    if shortest.len() <= width {
        return shortest;
    }

    for decimals in (0..width).rev() {
        let mut text = format!("{:.*}", decimals, value);
        if text.contains('.') {
            text = text.trim_end_matches('0').trim_end_matches('.').to_string();
        }
        if text == "-0" {
            text = "0".to_string();
        }
        if text.len() <= width {
            return text;
        }
    }

    shortest[..width].to_string()
}

/// Value a reader parses back from the field written by `format_number`
pub fn header_number(value: f64, width: usize) -> f64 {
    format_number(value, width).parse().unwrap_or(0.0)
}

/// 数值写入定长字段后相对误差是否在 1e-6 以内
pub fn fits_number_field(value: f64, width: usize) -> bool {
    (header_number(value, width) - value).abs() <= value.abs() * 1e-6
}

/// 将秒数格式化为 TAL 时间戳（最多7位小数，去掉尾随零）
pub fn format_tal_seconds(seconds: f64) -> String {
    if seconds.fract() == 0.0 {
        return format!("{}", seconds as i64);
    }
    format!("{:.7}", seconds)
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_ascii() {
        assert_eq!(to_ascii("SpO2"), "SpO2");
        assert_eq!(to_ascii("µV"), "_V");
        assert_eq!(to_ascii("a\tb"), "a_b");
    }

    #[test]
    fn test_put_text_pads_and_truncates() {
        let mut field = [0u8; 8];
        put_text(&mut field, "uV");
        assert_eq!(&field, b"uV      ");

        put_text(&mut field, "arbitrary units");
        assert_eq!(&field, b"arbitrar");

        put_text(&mut field, "");
        assert_eq!(&field, b"        ");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(100.0, 8), "100");
        assert_eq!(format_number(-200.0, 8), "-200");
        assert_eq!(format_number(0.5, 8), "0.5");
        assert_eq!(format_number(-0.0, 8), "0");
        assert_eq!(format_number(-32768.0, 8), "-32768");
        assert_eq!(format_number(1.0 / 3.0, 8), "0.333333");
        assert_eq!(format_number(-1234.56789, 8), "-1234.57");
        assert_eq!(format_number(123456789.0, 8), "12345678");
        assert!(format_number(f64::NAN, 8) == "0");
    }

    #[test]
    fn test_put_number_exact_width() {
        for value in [0.0, 1.0, -99999.99, 1e12, -1e-9, 3.14159265] {
            let mut field = [0u8; 8];
            put_number(&mut field, value);
            assert_eq!(field.len(), 8);
            assert!(field.iter().all(|b| (32..=126).contains(b)));
        }
    }

    #[test]
    fn test_fits_number_field() {
        assert!(fits_number_field(0.0, 8));
        assert!(fits_number_field(-3276.8, 8));
        assert!(fits_number_field(1.0 / 3.0, 8));
        assert!(!fits_number_field(1e-9, 8));
        assert!(!fits_number_field(123456789.0, 8));
        assert!(!fits_number_field(-123456789.0, 8));
        assert_eq!(header_number(1e-9, 8), 0.0);
    }

    #[test]
    fn test_format_tal_seconds() {
        assert_eq!(format_tal_seconds(0.0), "0");
        assert_eq!(format_tal_seconds(3.0), "3");
        assert_eq!(format_tal_seconds(1.5), "1.5");
        assert_eq!(format_tal_seconds(0.25), "0.25");
    }
}
