//! IP 地址分类

use std::net::IpAddr;

/// 不允许作为短链目标的地址：回环、私有、链路本地、未指定
pub fn is_internal(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
        }
        IpAddr::V6(v6) => {
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return is_internal(&IpAddr::V4(mapped));
            }
            // - fc00::/7 (ULA)
            // - fe80::/10 (link-local)
            v6.is_loopback()
                || v6.is_unspecified()
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                || (v6.segments()[0] & 0xffc0) == 0xfe80
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_v4() {
        for ip in ["127.0.0.1", "10.1.2.3", "172.16.0.1", "192.168.1.1", "169.254.1.1", "0.0.0.0"] {
            assert!(is_internal(&ip.parse().unwrap()), "{}", ip);
        }
        assert!(!is_internal(&"93.184.216.34".parse().unwrap()));
    }

    #[test]
    fn test_internal_v6() {
        for ip in ["::1", "fd00::1", "fe80::1", "::ffff:127.0.0.1", "::"] {
            assert!(is_internal(&ip.parse().unwrap()), "{}", ip);
        }
        assert!(!is_internal(&"2606:2800:220:1::".parse().unwrap()));
    }
}
