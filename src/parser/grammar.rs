use regex::Regex;

/// Literal placeholder the load balancer writes for "value not applicable".
/// Preserved verbatim in parsed records, never coerced to zero or empty.
pub const SENTINEL: &str = "-";

// ALB access log grammar, one line per request:
// https://docs.aws.amazon.com/elasticloadbalancing/latest/application/load-balancer-access-logs.html
//
// Space-delimited positional fields. The request line, user agent, trace id,
// domain name, cert arn, actions and redirect url are double-quoted and may
// contain embedded spaces and backslash escapes. Everything from the target
// group arn onward is optional so that lines written by older load balancers
// still match, and a trailing catch-all absorbs fields added to the format
// after this grammar was fixed.
const ALB_LOG_PATTERN: &str = concat!(
    r#"^(?P<type>[^ ]+)"#,
    r#" (?P<time>[^ ]+)"#,
    r#" (?P<elb>[^ ]+)"#,
    r#" (?P<client>[^ ]+)"#,
    r#" (?P<target>[^ ]+)"#,
    r#" (?P<request_processing_time>[-.0-9]+)"#,
    r#" (?P<target_processing_time>[-.0-9]+)"#,
    r#" (?P<response_processing_time>[-.0-9]+)"#,
    r#" (?P<elb_status_code>[-0-9]+)"#,
    r#" (?P<target_status_code>[-0-9]+)"#,
    r#" (?P<received_bytes>[-0-9]+)"#,
    r#" (?P<sent_bytes>[-0-9]+)"#,
    r#" "(?P<request>[^"\\]*(?:\\.[^"\\]*)*)""#,
    r#" "(?P<user_agent>[^"\\]*(?:\\.[^"\\]*)*)""#,
    r#" (?P<ssl_cipher>[^ ]+)"#,
    r#" (?P<ssl_protocol>[^ ]+)"#,
    r#"(?: (?P<target_group_arn>[^ "]+))?"#,
    r#"(?: "(?P<trace_id>[^"]*)")?"#,
    r#"(?: "(?P<domain_name>[^"]*)")?"#,
    r#"(?: "(?P<chosen_cert_arn>[^"]*)")?"#,
    r#"(?: (?P<matched_rule_priority>[-0-9]+))?"#,
    r#"(?: (?P<request_creation_time>[^ "]+))?"#,
    r#"(?: "(?P<actions_executed>[^"]*)")?"#,
    r#"(?: "(?P<redirect_url>[^"]*)")?"#,
    r#"(?P<extra_fields>.*)$"#,
);

/// One parsed access-log line. Every field is a literal string slice of the
/// input so sentinel values (`-`, `-1`) survive exactly as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub log_type: String,
    pub timestamp: String,
    pub elb: String,
    pub client_ip: String,
    pub client_port: String,
    pub target_ip: String,
    pub target_port: String,
    pub request_processing_time: String,
    pub target_processing_time: String,
    pub response_processing_time: String,
    pub elb_status_code: String,
    pub target_status_code: String,
    pub received_bytes: String,
    pub sent_bytes: String,
    pub request_verb: String,
    pub request_url: String,
    pub request_proto: String,
    pub user_agent: String,
    pub ssl_cipher: String,
    pub ssl_protocol: String,
    pub target_group_arn: String,
    pub trace_id: String,
    pub domain_name: String,
    pub chosen_cert_arn: String,
    pub matched_rule_priority: String,
    pub request_creation_time: String,
    pub actions_executed: String,
    pub redirect_url: String,
    pub extra_fields: String,
    /// Object key the line came from; attached by the pipeline, not the grammar.
    pub source_file: String,
}

/// Parser for the ALB access log grammar. Compiles the pattern once;
/// `parse` is pure and does no I/O.
#[derive(Debug)]
pub struct AlbLineParser {
    pattern: Regex,
}

impl Default for AlbLineParser {
    fn default() -> Self {
        Self::new()
    }
}

impl AlbLineParser {
    pub fn new() -> Self {
        // Fixed pattern, compilation cannot fail
        let pattern = Regex::new(ALB_LOG_PATTERN).unwrap();
        Self { pattern }
    }

    /// Parse one line of decompressed log text.
    ///
    /// Returns `None` when the line does not match the grammar. A non-matching
    /// line never yields a partially populated record.
    pub fn parse(&self, line: &str) -> Option<LogRecord> {
        let line = line.trim_end_matches(['\r', '\n']);
        let caps = self.pattern.captures(line)?;

        let field = |name: &str| -> String {
            caps.name(name)
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| SENTINEL.to_string())
        };

        let client = caps.name("client").expect("client group must exist");
        let target = caps.name("target").expect("target group must exist");
        let request = caps.name("request").expect("request group must exist");

        let (client_ip, client_port) = split_address(client.as_str());
        let (target_ip, target_port) = split_address(target.as_str());
        let (request_verb, request_url, request_proto) = split_request(request.as_str());

        Some(LogRecord {
            log_type: field("type"),
            timestamp: field("time"),
            elb: field("elb"),
            client_ip,
            client_port,
            target_ip,
            target_port,
            request_processing_time: field("request_processing_time"),
            target_processing_time: field("target_processing_time"),
            response_processing_time: field("response_processing_time"),
            elb_status_code: field("elb_status_code"),
            target_status_code: field("target_status_code"),
            received_bytes: field("received_bytes"),
            sent_bytes: field("sent_bytes"),
            request_verb,
            request_url,
            request_proto,
            user_agent: field("user_agent"),
            ssl_cipher: field("ssl_cipher"),
            ssl_protocol: field("ssl_protocol"),
            target_group_arn: field("target_group_arn"),
            trace_id: field("trace_id"),
            domain_name: field("domain_name"),
            chosen_cert_arn: field("chosen_cert_arn"),
            matched_rule_priority: field("matched_rule_priority"),
            request_creation_time: field("request_creation_time"),
            actions_executed: field("actions_executed"),
            redirect_url: field("redirect_url"),
            extra_fields: field("extra_fields").trim_start().to_string(),
            source_file: String::new(),
        })
    }
}

/// Split an `address:port` token on the last colon, so bracketed IPv6
/// addresses (`[2001:db8::1]:443`) keep their internal colons. A bare `-`
/// (no target, e.g. a rejected request) maps to sentinel ip and port.
fn split_address(token: &str) -> (String, String) {
    if token == SENTINEL {
        return (SENTINEL.to_string(), SENTINEL.to_string());
    }

    match token.rfind(':') {
        Some(idx) if token[idx + 1..].chars().all(|c| c.is_ascii_digit()) => {
            let host = token[..idx]
                .trim_start_matches('[')
                .trim_end_matches(']')
                .to_string();
            (host, token[idx + 1..].to_string())
        }
        _ => (token.to_string(), SENTINEL.to_string()),
    }
}

/// Split the quoted request line into verb, url and protocol. The load
/// balancer writes `- -` for requests it could not parse; missing pieces
/// become sentinels rather than empty strings.
fn split_request(request: &str) -> (String, String, String) {
    let tokens: Vec<&str> = request.split(' ').filter(|t| !t.is_empty()).collect();
    match tokens.len() {
        0 => (
            SENTINEL.to_string(),
            SENTINEL.to_string(),
            SENTINEL.to_string(),
        ),
        1 => (tokens[0].to_string(), SENTINEL.to_string(), SENTINEL.to_string()),
        2 => (
            tokens[0].to_string(),
            tokens[1].to_string(),
            SENTINEL.to_string(),
        ),
        n => (
            tokens[0].to_string(),
            tokens[1..n - 1].join(" "),
            tokens[n - 1].to_string(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_LINE: &str = concat!(
        "https 2023-04-02T09:18:33.013847Z app/my-alb/50dc6c495c0c9188 ",
        "192.168.131.39:2817 10.0.0.1:80 0.000 0.001 0.000 200 200 34 366 ",
        "\"GET https://www.example.com:443/path?q=1 HTTP/1.1\" ",
        "\"Mozilla/5.0 (Windows NT 10.0; Win64; x64) Gecko/20100101\" ",
        "ECDHE-RSA-AES128-GCM-SHA256 TLSv1.2 ",
        "arn:aws:elasticloadbalancing:us-east-2:123456789012:targetgroup/my-targets/73e2d6bc24d8a067 ",
        "\"Root=1-58337281-1d84f3d73c47ec4e58577259\" \"www.example.com\" ",
        "\"arn:aws:acm:us-east-2:123456789012:certificate/12345678-1234-1234-1234-123456789012\" ",
        "0 2023-04-02T09:18:33.010000Z \"forward\" \"-\"",
    );

    #[test]
    fn test_parse_full_line() {
        let parser = AlbLineParser::new();
        let record = parser.parse(FULL_LINE).expect("line should match");

        assert_eq!(record.log_type, "https");
        assert_eq!(record.timestamp, "2023-04-02T09:18:33.013847Z");
        assert_eq!(record.elb, "app/my-alb/50dc6c495c0c9188");
        assert_eq!(record.client_ip, "192.168.131.39");
        assert_eq!(record.client_port, "2817");
        assert_eq!(record.target_ip, "10.0.0.1");
        assert_eq!(record.target_port, "80");
        assert_eq!(record.request_verb, "GET");
        assert_eq!(record.request_url, "https://www.example.com:443/path?q=1");
        assert_eq!(record.request_proto, "HTTP/1.1");
        assert_eq!(
            record.user_agent,
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) Gecko/20100101"
        );
        assert_eq!(record.ssl_cipher, "ECDHE-RSA-AES128-GCM-SHA256");
        assert_eq!(record.ssl_protocol, "TLSv1.2");
        assert_eq!(
            record.trace_id,
            "Root=1-58337281-1d84f3d73c47ec4e58577259"
        );
        assert_eq!(record.domain_name, "www.example.com");
        assert_eq!(record.matched_rule_priority, "0");
        assert_eq!(record.request_creation_time, "2023-04-02T09:18:33.010000Z");
        assert_eq!(record.actions_executed, "forward");
        assert_eq!(record.redirect_url, SENTINEL);
    }

    #[test]
    fn test_user_agent_with_spaces_is_one_field() {
        let parser = AlbLineParser::new();
        let record = parser.parse(FULL_LINE).unwrap();
        assert!(record.user_agent.contains(' '));
        assert!(record.user_agent.starts_with("Mozilla/5.0"));
    }

    #[test]
    fn test_sentinel_durations_preserved() {
        let line = "http 2023-01-01T00:00:00.000000Z my-alb 10.0.0.2:443 - \
                    -1 -1 -1 503 - 86 288 \"GET http://x/ HTTP/1.1\" \"curl/8.0\" - -";
        let parser = AlbLineParser::new();
        let record = parser.parse(line).unwrap();

        assert_eq!(record.request_processing_time, "-1");
        assert_eq!(record.target_processing_time, "-1");
        assert_eq!(record.response_processing_time, "-1");
        assert_eq!(record.target_status_code, SENTINEL);
        assert_eq!(record.target_ip, SENTINEL);
        assert_eq!(record.target_port, SENTINEL);
        assert_eq!(record.ssl_cipher, SENTINEL);
    }

    #[test]
    fn test_short_line_without_optional_tail() {
        // Lines predating the trace id / domain / cert fields still match
        let line = "http 2023-01-01T00:00:00.000000Z my-alb 192.168.1.1:2817 \
                    10.0.0.1:80 0.001 0.002 0.000 200 200 34 366 \
                    \"GET http://example.com:80/ HTTP/1.1\" \"curl/7.46.0\" - - \
                    arn:aws:elasticloadbalancing:us-east-1:1:targetgroup/tg/abc";
        let parser = AlbLineParser::new();
        let record = parser.parse(line).unwrap();

        assert_eq!(record.request_verb, "GET");
        assert_eq!(record.elb_status_code, "200");
        assert_eq!(record.user_agent, "curl/7.46.0");
        assert_eq!(
            record.target_group_arn,
            "arn:aws:elasticloadbalancing:us-east-1:1:targetgroup/tg/abc"
        );
        assert_eq!(record.trace_id, SENTINEL);
        assert_eq!(record.redirect_url, SENTINEL);
    }

    #[test]
    fn test_non_matching_line_yields_none() {
        let parser = AlbLineParser::new();
        assert!(parser.parse("not an access log line").is_none());
        assert!(parser.parse("").is_none());
        assert!(parser
            .parse("http 2023-01-01T00:00:00Z my-alb missing-the-rest")
            .is_none());
    }

    #[test]
    fn test_trailing_newline_tolerated() {
        let parser = AlbLineParser::new();
        let with_newline = format!("{}\n", FULL_LINE);
        assert_eq!(parser.parse(&with_newline), parser.parse(FULL_LINE));
    }

    #[test]
    fn test_ipv6_address_split_on_last_colon() {
        let (host, port) = split_address("[2001:db8::1]:443");
        assert_eq!(host, "2001:db8::1");
        assert_eq!(port, "443");

        let (host, port) = split_address("10.1.2.3:65535");
        assert_eq!(host, "10.1.2.3");
        assert_eq!(port, "65535");

        let (host, port) = split_address("-");
        assert_eq!(host, SENTINEL);
        assert_eq!(port, SENTINEL);
    }

    #[test]
    fn test_extra_fields_absorb_format_additions() {
        let line = format!("{} \"10.0.0.1:80\" \"200\" \"-\" \"-\"", FULL_LINE);
        let parser = AlbLineParser::new();
        let record = parser.parse(&line).unwrap();
        assert_eq!(record.extra_fields, "\"10.0.0.1:80\" \"200\" \"-\" \"-\"");
    }

    #[test]
    fn test_malformed_request_line() {
        let line = "http 2023-01-01T00:00:00.000000Z my-alb 10.0.0.2:443 10.0.0.1:80 \
                    0.0 0.0 0.0 400 - 0 0 \"- -\" \"-\" - -";
        let parser = AlbLineParser::new();
        let record = parser.parse(line).unwrap();
        assert_eq!(record.request_verb, SENTINEL);
        assert_eq!(record.request_url, SENTINEL);
        assert_eq!(record.request_proto, SENTINEL);
    }
}
