use flare_auth_core::otp::{DEFAULT_CODE_LENGTH, MAX_CODE_LENGTH, generate_code, normalize_length};

#[test]
fn non_positive_length_falls_back_to_default() {
    assert_eq!(normalize_length(0), DEFAULT_CODE_LENGTH);
    assert_eq!(normalize_length(-3), DEFAULT_CODE_LENGTH);
    assert_eq!(generate_code(0).len(), 6);
}

#[test]
fn length_is_capped() {
    assert_eq!(normalize_length(15), MAX_CODE_LENGTH);
    assert_eq!(generate_code(15).len(), 10);
    assert_eq!(generate_code(1).len(), 1);
    assert_eq!(generate_code(10).len(), 10);
}

#[test]
fn codes_are_decimal_digits() {
    for _ in 0..200 {
        let code = generate_code(8);
        assert!(code.chars().all(|c| c.is_ascii_digit()), "bad code {code}");
    }
}

#[test]
fn codes_cover_every_digit() {
    let mut seen = [false; 10];
    for _ in 0..200 {
        for c in generate_code(10).chars() {
            seen[(c as u8 - b'0') as usize] = true;
        }
    }
    assert!(seen.iter().all(|&s| s));
}
