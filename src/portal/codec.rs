//! 门户路径转义编解码
//!
//! 门户在路径段中用 `*uuml;` 这类字面量替代德语扩展字符；展示字段里则使用
//! 标准 HTML 实体。两套映射互不相干：`html_decode` 只用于展示文本，永远不要
//! 作用在请求地址上。

/// 路径转义表（字符, 转义 token）
const PATH_TOKENS: [(char, &str); 7] = [
    ('ü', "*uuml;"),
    ('ö', "*ouml;"),
    ('ä', "*auml;"),
    ('Ü', "*Uuml;"),
    ('Ö', "*Ouml;"),
    ('Ä', "*Auml;"),
    ('ß', "*szlig;"),
];

/// 展示字段中出现的 HTML 实体
const HTML_ENTITIES: [(&str, char); 12] = [
    ("&amp;", '&'),
    ("&szlig;", 'ß'),
    ("&ouml;", 'ö'),
    ("&auml;", 'ä'),
    ("&uuml;", 'ü'),
    ("&Auml;", 'Ä'),
    ("&Ouml;", 'Ö'),
    ("&Uuml;", 'Ü'),
    ("&quot;", '"'),
    ("&lt;", '<'),
    ("&gt;", '>'),
    ("&#39;", '\''),
];

/// 把展示文本编码为门户路径 token
pub fn encode(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match PATH_TOKENS.iter().find(|(ch, _)| *ch == c) {
            Some((_, token)) => out.push_str(token),
            None => out.push(c),
        }
    }
    out
}

/// 把门户路径 token 还原为展示文本
///
/// 单遍扫描，每个位置按最长 token 优先匹配，已还原的字符不会再参与匹配。
pub fn decode(token: &str) -> String {
    replace_longest_first(token, &path_table())
}

/// 还原展示字段中的 HTML 实体
pub fn html_decode(text: &str) -> String {
    let table: Vec<(&str, char)> = HTML_ENTITIES.to_vec();
    replace_longest_first(text, &table)
}

fn path_table() -> Vec<(&'static str, char)> {
    PATH_TOKENS.iter().map(|(c, t)| (*t, *c)).collect()
}

fn replace_longest_first(input: &str, table: &[(&str, char)]) -> String {
    let mut sorted = table.to_vec();
    sorted.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(c) = rest.chars().next() {
        match sorted.iter().find(|(token, _)| rest.starts_with(token)) {
            Some((token, ch)) => {
                out.push(*ch);
                rest = &rest[token.len()..];
            }
            None => {
                out.push(c);
                rest = &rest[c.len_utf8()..];
            }
        }
    }
    out
}

/// 所有路径 token 的集合（供上层校验使用）
pub fn path_tokens() -> impl Iterator<Item = (char, &'static str)> {
    PATH_TOKENS.iter().copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const EXTENDED: [char; 7] = ['ü', 'ö', 'ä', 'Ü', 'Ö', 'Ä', 'ß'];

    /// 可打印 ASCII 与扩展字符混合的展示文本
    fn display_text() -> impl Strategy<Value = String> {
        proptest::collection::vec(
            prop_oneof![
                3 => proptest::char::range(' ', '~'),
                1 => proptest::sample::select(EXTENDED.to_vec()),
            ],
            0..48,
        )
        .prop_map(|chars| chars.into_iter().collect())
    }

    /// ASCII 片段与完整转义 token 拼接成的门户路径
    fn escaped_text() -> impl Strategy<Value = String> {
        let tokens: Vec<&'static str> = PATH_TOKENS.iter().map(|(_, t)| *t).collect();
        proptest::collection::vec(
            prop_oneof![
                3 => proptest::char::range(' ', '~').prop_map(|c| c.to_string()),
                1 => proptest::sample::select(tokens).prop_map(str::to_string),
            ],
            0..32,
        )
        .prop_map(|parts| parts.concat())
    }

    fn contains_token(text: &str) -> bool {
        path_tokens().any(|(_, token)| text.contains(token))
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(s in display_text()) {
            // 字面量 token 本身不属于展示字母表
            prop_assume!(!contains_token(&s));
            prop_assert_eq!(decode(&encode(&s)), s);
        }

        #[test]
        fn encode_inverts_decode_for_plain_ascii(s in "[ -~]{0,48}") {
            prop_assume!(!contains_token(&s));
            prop_assert_eq!(encode(&decode(&s)), s.clone());
            prop_assert_eq!(decode(&s), s);
        }

        #[test]
        fn encode_inverts_decode_for_escaped_paths(t in escaped_text()) {
            prop_assert_eq!(encode(&decode(&t)), t);
        }
    }

    #[test]
    fn test_encode_each_char() {
        for (c, token) in path_tokens() {
            assert_eq!(encode(&c.to_string()), token);
            assert_eq!(decode(token), c.to_string());
        }
    }

    #[test]
    fn test_round_trip_mixed() {
        let samples = [
            "",
            "Übungen",
            "/snvcloud/Home/Schüler/Größe ändern.txt",
            "ÄÖÜäöüß",
            "plain ascii 123 *;&",
            "Straße/Öffnungszeiten/",
        ];
        for s in samples {
            assert_eq!(decode(&encode(s)), s, "decode(encode({s:?}))");
        }
        let escaped = "/snvcloud/Sch*uuml;ler/Gr*ouml;*szlig;e/";
        assert_eq!(encode(&decode(escaped)), escaped);
    }

    #[test]
    fn test_no_token_overlaps_another_replacement() {
        let tokens: Vec<_> = path_tokens().collect();
        for (c, token) in &tokens {
            for (other_c, other) in &tokens {
                if c != other_c {
                    assert!(!token.contains(other), "{token} contains {other}");
                }
                // 还原结果是单个非 ASCII 字符，不可能构成任何 token 的前缀
                assert!(!other.starts_with(*c));
            }
        }
    }

    #[test]
    fn test_decode_is_single_pass() {
        // "*" 后面不是完整 token 时保持原样
        assert_eq!(decode("*uuml"), "*uuml");
        assert_eq!(decode("**uuml;;"), "*ü;");
    }

    #[test]
    fn test_html_decode() {
        assert_eq!(html_decode("Hauptstra&szlig;e 5"), "Hauptstraße 5");
        assert_eq!(html_decode("M&uuml;ller &amp; S&ouml;hne"), "Müller & Söhne");
        // 只解码一次
        assert_eq!(html_decode("&amp;auml;"), "&auml;");
    }

    #[test]
    fn test_html_decode_does_not_touch_path_tokens() {
        assert_eq!(html_decode("*uuml;"), "*uuml;");
        assert_eq!(decode("&uuml;"), "&uuml;");
    }
}
