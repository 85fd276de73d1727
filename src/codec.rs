//! Base62 短码编解码
//!
//! 短码是 id 的可逆编码，不单独存储。编码前先对 id 做一次固定变换
//! `n = OFFSET.wrapping_sub(id)`，让连续 id 产生看起来不连续的短码：
//!
//! - 变换是 u64 上的双射（模 2^64 减法），逆变换与正变换相同
//! - `0..=OFFSET` 范围内的 id 映射到 `OFFSET..=0`，短码最长 5 个字符
//! - 大于 `OFFSET` 的 id 会回绕到接近 `u64::MAX` 的数值，短码为 11 个字符，
//!   依然可逆，不存在溢出或下溢
//!
//! 解码时数值超出 u64 的字符串视为非法短码。

use crate::errors::{Result, SnaplinkError};

/// 62 个符号：数字、小写字母、大写字母
pub const ALPHABET: &[u8; 62] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// 固定偏移量，修改它会让所有已发出的短码失效
pub const OFFSET: u64 = 100_000_000;

/// u64 的 base62 表示最多 11 位
pub const MAX_CODE_LEN: usize = 11;

const BASE: u64 = 62;

/// 字节 → 字母表下标，非法字符为 0xFF
const DECODE_TABLE: [u8; 256] = build_decode_table();

const fn build_decode_table() -> [u8; 256] {
    let mut table = [0xFFu8; 256];
    let mut i = 0;
    while i < ALPHABET.len() {
        table[ALPHABET[i] as usize] = i as u8;
        i += 1;
    }
    table
}

/// 将 id 编码为短码
pub fn encode(id: u64) -> String {
    encode_raw(OFFSET.wrapping_sub(id))
}

/// 将短码解码为 id
///
/// 空字符串、字母表以外的字符、超过 u64 的数值均返回 `InvalidCode`。
pub fn decode(code: &str) -> Result<u64> {
    decode_raw(code).map(|n| OFFSET.wrapping_sub(n))
}

/// 不带偏移变换的 base62 编码
fn encode_raw(mut num: u64) -> String {
    if num == 0 {
        return "0".to_string();
    }

    let mut buf = [0u8; MAX_CODE_LEN];
    let mut pos = MAX_CODE_LEN;
    while num > 0 {
        pos -= 1;
        buf[pos] = ALPHABET[(num % BASE) as usize];
        num /= BASE;
    }

    // buf 只包含 ASCII 字母数字
    buf[pos..].iter().map(|&b| b as char).collect()
}

fn decode_raw(code: &str) -> Result<u64> {
    if code.is_empty() {
        return Err(SnaplinkError::invalid_code("short code is empty"));
    }
    if code.len() > MAX_CODE_LEN {
        return Err(SnaplinkError::invalid_code(format!(
            "short code too long: {} characters",
            code.len()
        )));
    }

    let mut num: u64 = 0;
    for byte in code.bytes() {
        let digit = DECODE_TABLE[byte as usize];
        if digit == 0xFF {
            return Err(SnaplinkError::invalid_code(format!(
                "invalid character in short code: {:?}",
                byte as char
            )));
        }
        num = num
            .checked_mul(BASE)
            .and_then(|n| n.checked_add(digit as u64))
            .ok_or_else(|| SnaplinkError::invalid_code("short code out of range"))?;
    }

    Ok(num)
}

/// 短码是否只包含字母表字符且长度合法（不做数值范围检查）
pub fn is_well_formed(code: &str) -> bool {
    !code.is_empty()
        && code.len() <= MAX_CODE_LEN
        && code.bytes().all(|b| DECODE_TABLE[b as usize] != 0xFF)
}
