//! Proxy Auto-Configuration support: evaluates a `FindProxyForURL` script
//! against a URL/host pair to produce a verdict string, which `parent`
//! then parses into an ordered parent list.
//!
//! Full ECMAScript is out of scope; this evaluates the common subset real
//! PAC files use — a sequence of `if (condition) return "verdict";`
//! statements guarded by `dnsDomainIs`, `shExpMatch`, and
//! `isPlainHostName` calls, falling through to a trailing bare `return`.
//! A PAC file using other JS features is not supported; callers should
//! treat a parse failure as "no PAC verdict" and fall back to the static
//! parent list.

use std::sync::Mutex;

use ntlmproxy_core::error::ProxyError;
use ntlmproxy_core::ProxyResult;

use crate::noproxy::NoProxyPattern;

#[derive(Debug, Clone)]
enum Condition {
    DnsDomainIs(String),
    ShExpMatch(String),
    IsPlainHostName,
    Not(Box<Condition>),
}

#[derive(Debug, Clone)]
struct Rule {
    condition: Option<Condition>,
    verdict: String,
}

/// The underlying interpreter is not re-entrant (it holds line-by-line
/// parse state during a call), so every evaluation takes the lock for
/// its full duration, not just for list mutation.
pub struct PacEngine {
    rules: Mutex<Vec<Rule>>,
}

impl PacEngine {
    pub fn parse(script: &str) -> ProxyResult<Self> {
        let rules = parse_rules(script)?;
        Ok(Self { rules: Mutex::new(rules) })
    }

    pub fn find_proxy_for_url(&self, host: &str) -> ProxyResult<String> {
        let rules = self.rules.lock().expect("PAC engine mutex poisoned");
        for rule in rules.iter() {
            let matched = match &rule.condition {
                None => true,
                Some(cond) => evaluate(cond, host),
            };
            if matched {
                return Ok(rule.verdict.clone());
            }
        }
        Err(ProxyError::config("PAC script produced no verdict for host"))
    }
}

fn evaluate(condition: &Condition, host: &str) -> bool {
    match condition {
        Condition::DnsDomainIs(suffix) => host.eq_ignore_ascii_case(suffix.trim_start_matches('.'))
            || host.to_ascii_lowercase().ends_with(&suffix.to_ascii_lowercase()),
        Condition::ShExpMatch(pattern) => NoProxyPattern::new(pattern).matches(host),
        Condition::IsPlainHostName => !host.contains('.'),
        Condition::Not(inner) => !evaluate(inner, host),
    }
}

fn parse_rules(script: &str) -> ProxyResult<Vec<Rule>> {
    let mut rules = Vec::new();
    for raw_line in script.lines() {
        let line = raw_line.trim().trim_end_matches(';');
        if line.is_empty() || line.starts_with("function") || line == "}" || line.starts_with("//") {
            continue;
        }
        if let Some(rest) = line.strip_prefix("if") {
            let rest = rest.trim();
            let rest = rest
                .strip_prefix('(')
                .ok_or_else(|| ProxyError::config("malformed PAC if-statement"))?;
            let (cond_str, after) = rest
                .split_once(')')
                .ok_or_else(|| ProxyError::config("unterminated PAC condition"))?;
            let condition = parse_condition(cond_str.trim())?;
            let verdict = parse_return(after.trim())?;
            rules.push(Rule { condition: Some(condition), verdict });
        } else if let Some(rest) = line.strip_prefix("return") {
            let verdict = parse_return_body(rest.trim())?;
            rules.push(Rule { condition: None, verdict });
        }
    }
    Ok(rules)
}

fn parse_return(after_if_body: &str) -> ProxyResult<String> {
    let body = after_if_body
        .trim_start_matches('{')
        .trim_end_matches('}')
        .trim();
    let body = body
        .strip_prefix("return")
        .ok_or_else(|| ProxyError::config("PAC if-body is not a bare return"))?;
    parse_return_body(body.trim())
}

fn parse_return_body(literal: &str) -> ProxyResult<String> {
    let trimmed = literal.trim().trim_end_matches(';');
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .ok_or_else(|| ProxyError::config("PAC return value is not a string literal"))?;
    Ok(unquoted.to_string())
}

fn parse_condition(expr: &str) -> ProxyResult<Condition> {
    if let Some(rest) = expr.strip_prefix('!') {
        return Ok(Condition::Not(Box::new(parse_condition(rest.trim())?)));
    }
    if expr.starts_with("dnsDomainIs") {
        let arg = call_args(expr, "dnsDomainIs")?;
        let suffix = arg
            .get(1)
            .ok_or_else(|| ProxyError::config("dnsDomainIs missing suffix arg"))?;
        return Ok(Condition::DnsDomainIs(unquote(suffix)?));
    }
    if expr.starts_with("shExpMatch") {
        let arg = call_args(expr, "shExpMatch")?;
        let pattern = arg
            .get(1)
            .ok_or_else(|| ProxyError::config("shExpMatch missing pattern arg"))?;
        return Ok(Condition::ShExpMatch(unquote(pattern)?));
    }
    if expr.starts_with("isPlainHostName") {
        return Ok(Condition::IsPlainHostName);
    }
    Err(ProxyError::config(format!("unsupported PAC condition: {expr:?}")))
}

fn call_args<'a>(expr: &'a str, name: &str) -> ProxyResult<Vec<&'a str>> {
    let rest = expr
        .strip_prefix(name)
        .and_then(|s| s.trim().strip_prefix('('))
        .and_then(|s| s.trim().strip_suffix(')'))
        .ok_or_else(|| ProxyError::config(format!("malformed {name} call")))?;
    Ok(rest.split(',').map(str::trim).collect())
}

fn unquote(token: &str) -> ProxyResult<String> {
    token
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .map(str::to_string)
        .ok_or_else(|| ProxyError::config(format!("expected string literal, got {token:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
function FindProxyForURL(url, host) {
    if (isPlainHostName(host)) {
        return "DIRECT";
    }
    if (dnsDomainIs(host, ".local")) {
        return "DIRECT";
    }
    if (shExpMatch(host, "*.example.com")) {
        return "PROXY proxy1.example.com:8080";
    }
    return "PROXY proxy1.example.com:8080; PROXY proxy2.example.com:3128; DIRECT";
}
"#;

    #[test]
    fn plain_hostname_goes_direct() {
        let engine = PacEngine::parse(SAMPLE).unwrap();
        assert_eq!(engine.find_proxy_for_url("fileserver").unwrap(), "DIRECT");
    }

    #[test]
    fn dns_domain_suffix_goes_direct() {
        let engine = PacEngine::parse(SAMPLE).unwrap();
        assert_eq!(engine.find_proxy_for_url("intra.local").unwrap(), "DIRECT");
    }

    #[test]
    fn shexpmatch_picks_named_proxy() {
        let engine = PacEngine::parse(SAMPLE).unwrap();
        assert_eq!(
            engine.find_proxy_for_url("www.example.com").unwrap(),
            "PROXY proxy1.example.com:8080"
        );
    }

    #[test]
    fn fallthrough_returns_full_verdict_list() {
        let engine = PacEngine::parse(SAMPLE).unwrap();
        assert_eq!(
            engine.find_proxy_for_url("other.org").unwrap(),
            "PROXY proxy1.example.com:8080; PROXY proxy2.example.com:3128; DIRECT"
        );
    }
}
