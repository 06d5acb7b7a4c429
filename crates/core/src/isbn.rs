//! ISBN-10 / ISBN-13 digit extraction and checksum validation.

/// Strip everything but digits and a trailing `X`/`x` check digit, as used
/// by the cache key schema (`book:isbn:{digits(isbn)}`).
pub fn digits(isbn: &str) -> String {
    isbn.chars()
        .filter(|c| c.is_ascii_digit() || *c == 'X' || *c == 'x')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Validate an ISBN-10 or ISBN-13 string, checksum included.
pub fn is_valid(isbn: &str) -> bool {
    let cleaned = digits(isbn);
    match cleaned.len() {
        10 => is_valid_isbn10(&cleaned),
        13 => is_valid_isbn13(&cleaned),
        _ => false,
    }
}

fn is_valid_isbn10(cleaned: &str) -> bool {
    let chars: Vec<char> = cleaned.chars().collect();
    if chars[..9].iter().any(|c| !c.is_ascii_digit()) {
        return false;
    }
    let last = chars[9];
    if !last.is_ascii_digit() && last != 'X' {
        return false;
    }

    let mut sum: u32 = 0;
    for (i, c) in chars.iter().enumerate().take(9) {
        let digit = c.to_digit(10).unwrap();
        sum += digit * (10 - i as u32);
    }
    sum += if last == 'X' { 10 } else { last.to_digit(10).unwrap() };

    sum % 11 == 0
}

fn is_valid_isbn13(cleaned: &str) -> bool {
    if cleaned.chars().any(|c| !c.is_ascii_digit()) {
        return false;
    }
    let digits: Vec<u32> = cleaned.chars().map(|c| c.to_digit(10).unwrap()).collect();

    let sum: u32 = digits
        .iter()
        .take(12)
        .enumerate()
        .map(|(i, d)| if i % 2 == 0 { *d } else { d * 3 })
        .sum();

    let check = (10 - (sum % 10)) % 10;
    check == digits[12]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_isbn13_accepted() {
        assert!(is_valid("9780439708180"));
    }

    #[test]
    fn invalid_isbn13_checksum_rejected() {
        assert!(!is_valid("9780439708181"));
    }

    #[test]
    fn valid_isbn10_accepted() {
        assert!(is_valid("0-306-40615-2"));
    }

    #[test]
    fn isbn10_with_x_check_digit() {
        // 097522980X is a well-known valid ISBN-10 with an X check digit.
        assert!(is_valid("097522980X"));
        assert!(is_valid("097522980x"));
    }

    #[test]
    fn wrong_length_rejected() {
        assert!(!is_valid("12345"));
    }

    #[test]
    fn digits_strips_hyphens_and_spaces() {
        assert_eq!(digits("978-0-439-70818-0"), "9780439708180");
    }
}
