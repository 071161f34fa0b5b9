//! Number parsing for matcher tokens: Arabic literals and Chinese numerals.

/// Parse a token as a number.
///
/// Accepts `[+-]digits[.digits]` and Chinese numerals such as `三`, `二十五`,
/// `一百零五`, `三点五`, `两万`, or positional digit runs like `一二三`.
/// Returns `None` for anything else, including empty input.
pub fn parse_number(token: &str) -> Option<f64> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    parse_arabic(token).or_else(|| parse_chinese(token))
}

fn parse_arabic(token: &str) -> Option<f64> {
    let body = token.strip_prefix(['+', '-']).unwrap_or(token);
    let (int_part, frac_part) = match body.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (body, None),
    };
    if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if let Some(f) = frac_part
        && (f.is_empty() || !f.bytes().all(|b| b.is_ascii_digit()))
    {
        return None;
    }
    token.parse::<f64>().ok()
}

fn digit(c: char) -> Option<u32> {
    Some(match c {
        '零' | '〇' => 0,
        '一' => 1,
        '二' | '两' => 2,
        '三' => 3,
        '四' => 4,
        '五' => 5,
        '六' => 6,
        '七' => 7,
        '八' => 8,
        '九' => 9,
        _ => return None,
    })
}

fn unit(c: char) -> Option<u32> {
    match c {
        '十' => Some(10),
        '百' => Some(100),
        '千' => Some(1000),
        _ => None,
    }
}

fn parse_chinese(token: &str) -> Option<f64> {
    let (int_part, frac_part) = match token.split_once('点') {
        Some((i, f)) => (i, Some(f)),
        None => (token, None),
    };

    let integer = if int_part.is_empty() {
        // "点五" is not a number on its own.
        return None;
    } else {
        parse_chinese_integer(int_part)?
    };

    let Some(frac) = frac_part else {
        return Some(integer);
    };
    if frac.is_empty() {
        return None;
    }
    let mut scale = 0.1;
    let mut fraction = 0.0;
    for c in frac.chars() {
        fraction += f64::from(digit(c)?) * scale;
        scale /= 10.0;
    }
    Some(integer + fraction)
}

fn parse_chinese_integer(s: &str) -> Option<f64> {
    // A run of bare digits reads positionally: 一二三 -> 123.
    if s.chars().count() > 1 && s.chars().all(|c| digit(c).is_some()) {
        let mut value = 0.0;
        for c in s.chars() {
            value = value * 10.0 + f64::from(digit(c)?);
        }
        return Some(value);
    }

    let mut total = 0.0_f64;
    let mut section = 0.0_f64;
    let mut number = 0.0_f64;
    let mut seen_any = false;

    for c in s.chars() {
        if let Some(d) = digit(c) {
            number = f64::from(d);
        } else if let Some(u) = unit(c) {
            // Leading 十 means 一十.
            let n = if number == 0.0 && section == 0.0 && u == 10 {
                1.0
            } else {
                number
            };
            section += n * f64::from(u);
            number = 0.0;
        } else if c == '万' {
            total += (section + number) * 1e4;
            section = 0.0;
            number = 0.0;
        } else if c == '亿' {
            total = (total + section + number) * 1e8;
            section = 0.0;
            number = 0.0;
        } else {
            return None;
        }
        seen_any = true;
    }

    seen_any.then_some(total + section + number)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Option<f64>, b: f64) -> bool {
        a.is_some_and(|a| (a - b).abs() < 1e-9)
    }

    #[test]
    fn arabic_literals() {
        assert!(approx(parse_number("3"), 3.0));
        assert!(approx(parse_number("-2.5"), -2.5));
        assert!(approx(parse_number("+10"), 10.0));
        assert_eq!(parse_number("1."), None);
        assert_eq!(parse_number(".5"), None);
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("3m"), None);
    }

    #[test]
    fn chinese_units() {
        assert!(approx(parse_number("三"), 3.0));
        assert!(approx(parse_number("十"), 10.0));
        assert!(approx(parse_number("十五"), 15.0));
        assert!(approx(parse_number("二十"), 20.0));
        assert!(approx(parse_number("一百零五"), 105.0));
        assert!(approx(parse_number("三千二百"), 3200.0));
        assert!(approx(parse_number("两万"), 20_000.0));
        assert!(approx(parse_number("一亿二千万"), 120_000_000.0));
    }

    #[test]
    fn chinese_fractions() {
        assert!(approx(parse_number("三点五"), 3.5));
        assert!(approx(parse_number("零点二五"), 0.25));
        assert_eq!(parse_number("点五"), None);
        assert_eq!(parse_number("三点"), None);
    }

    #[test]
    fn positional_digit_runs() {
        assert!(approx(parse_number("一二三"), 123.0));
        assert!(approx(parse_number("二零"), 20.0));
    }

    #[test]
    fn rejects_words() {
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("方块"), None);
        assert_eq!(parse_number("三个"), None);
    }
}
