use rand::Rng;
use rand::distributions::Uniform;
use rand::rngs::OsRng;

/// 未配置或配置为非正数时的验证码长度
pub const DEFAULT_CODE_LENGTH: usize = 6;

/// 验证码最大长度
pub const MAX_CODE_LENGTH: usize = 10;

/// 将配置长度钳制到 `[1, 10]`，非正数取默认值
pub fn normalize_length(configured: i32) -> usize {
    if configured <= 0 {
        DEFAULT_CODE_LENGTH
    } else {
        (configured as usize).min(MAX_CODE_LENGTH)
    }
}

/// 使用操作系统随机源生成纯数字验证码
pub fn generate_code(configured_length: i32) -> String {
    let length = normalize_length(configured_length);
    let digits = Uniform::new_inclusive(b'0', b'9');
    OsRng
        .sample_iter(digits)
        .take(length)
        .map(char::from)
        .collect()
}
