//! SMTP command parsing.

/// A parsed client command. Parsing never fails; anything unrecognized
/// becomes [`SmtpCommand::Unknown`] and is answered with a 500.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmtpCommand {
    Helo(String),
    Ehlo(String),
    MailFrom {
        address: String,
        declared_size: Option<usize>,
    },
    RcptTo(String),
    Data,
    Rset,
    Noop,
    Quit,
    Help,
    StartTls,
    Vrfy,
    Expn,
    Etrn,
    Turn,
    Unknown(String),
}

impl SmtpCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let upper = line.to_ascii_uppercase();

        if let Some(rest) = strip_prefix_ci(line, "MAIL FROM:") {
            let (address, params) = split_address(rest);
            return SmtpCommand::MailFrom {
                address,
                declared_size: parse_size_param(&params),
            };
        }
        if let Some(rest) = strip_prefix_ci(line, "RCPT TO:") {
            let (address, _) = split_address(rest);
            return SmtpCommand::RcptTo(address);
        }
        if let Some(rest) = strip_prefix_ci(line, "HELO") {
            return SmtpCommand::Helo(rest.trim().to_string());
        }
        if let Some(rest) = strip_prefix_ci(line, "EHLO") {
            return SmtpCommand::Ehlo(rest.trim().to_string());
        }

        match upper.as_str() {
            "DATA" => SmtpCommand::Data,
            "RSET" => SmtpCommand::Rset,
            "NOOP" => SmtpCommand::Noop,
            "QUIT" => SmtpCommand::Quit,
            "HELP" => SmtpCommand::Help,
            "STARTTLS" => SmtpCommand::StartTls,
            "VRFY" => SmtpCommand::Vrfy,
            "EXPN" => SmtpCommand::Expn,
            "ETRN" => SmtpCommand::Etrn,
            "TURN" => SmtpCommand::Turn,
            _ => {
                // NOOP and VRFY may legally carry arguments.
                let verb = upper.split_whitespace().next().unwrap_or_default();
                match verb {
                    "NOOP" => SmtpCommand::Noop,
                    "HELP" => SmtpCommand::Help,
                    "VRFY" => SmtpCommand::Vrfy,
                    "EXPN" => SmtpCommand::Expn,
                    "ETRN" => SmtpCommand::Etrn,
                    _ => SmtpCommand::Unknown(line.to_string()),
                }
            }
        }
    }

    /// The wire verb, used against the disabled-commands list.
    pub fn verb(&self) -> &'static str {
        match self {
            SmtpCommand::Helo(_) => "HELO",
            SmtpCommand::Ehlo(_) => "EHLO",
            SmtpCommand::MailFrom { .. } => "MAIL",
            SmtpCommand::RcptTo(_) => "RCPT",
            SmtpCommand::Data => "DATA",
            SmtpCommand::Rset => "RSET",
            SmtpCommand::Noop => "NOOP",
            SmtpCommand::Quit => "QUIT",
            SmtpCommand::Help => "HELP",
            SmtpCommand::StartTls => "STARTTLS",
            SmtpCommand::Vrfy => "VRFY",
            SmtpCommand::Expn => "EXPN",
            SmtpCommand::Etrn => "ETRN",
            SmtpCommand::Turn => "TURN",
            SmtpCommand::Unknown(_) => "",
        }
    }
}

fn strip_prefix_ci<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    if line.len() >= prefix.len() && line[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&line[prefix.len()..])
    } else {
        None
    }
}

/// Split `<address> PARAM=…` into the address and the parameter tail.
fn split_address(rest: &str) -> (String, String) {
    let rest = rest.trim();
    if let Some(open) = rest.find('<') {
        if let Some(close) = rest[open..].find('>') {
            let address = rest[open + 1..open + close].trim().to_string();
            let params = rest[open + close + 1..].trim().to_string();
            return (address, params);
        }
    }

    // Tolerate a missing angle-bracket pair.
    let mut parts = rest.splitn(2, char::is_whitespace);
    let address = parts.next().unwrap_or_default().trim().to_string();
    let params = parts.next().unwrap_or_default().trim().to_string();
    (address, params)
}

fn parse_size_param(params: &str) -> Option<usize> {
    for param in params.split_whitespace() {
        if let Some(value) = strip_prefix_ci(param, "SIZE=") {
            return value.parse().ok();
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mail_from_variants() {
        assert_eq!(
            SmtpCommand::parse("MAIL FROM:<s@ex.org>"),
            SmtpCommand::MailFrom {
                address: "s@ex.org".to_string(),
                declared_size: None
            }
        );
        assert_eq!(
            SmtpCommand::parse("mail from: <s@ex.org> SIZE=1024"),
            SmtpCommand::MailFrom {
                address: "s@ex.org".to_string(),
                declared_size: Some(1024)
            }
        );
        // Null sender.
        assert_eq!(
            SmtpCommand::parse("MAIL FROM:<>"),
            SmtpCommand::MailFrom {
                address: String::new(),
                declared_size: None
            }
        );
    }

    #[test]
    fn test_rcpt_to() {
        assert_eq!(
            SmtpCommand::parse("RCPT TO:<u@example.com>"),
            SmtpCommand::RcptTo("u@example.com".to_string())
        );
        assert_eq!(
            SmtpCommand::parse("rcpt to:u@example.com"),
            SmtpCommand::RcptTo("u@example.com".to_string())
        );
    }

    #[test]
    fn test_greetings() {
        assert_eq!(
            SmtpCommand::parse("EHLO client.ex.org"),
            SmtpCommand::Ehlo("client.ex.org".to_string())
        );
        assert_eq!(
            SmtpCommand::parse("helo client"),
            SmtpCommand::Helo("client".to_string())
        );
    }

    #[test]
    fn test_bare_commands_case_insensitive() {
        assert_eq!(SmtpCommand::parse("data"), SmtpCommand::Data);
        assert_eq!(SmtpCommand::parse("QUIT"), SmtpCommand::Quit);
        assert_eq!(SmtpCommand::parse("StartTLS"), SmtpCommand::StartTls);
        assert_eq!(SmtpCommand::parse("NOOP ping"), SmtpCommand::Noop);
        assert_eq!(SmtpCommand::parse("VRFY user"), SmtpCommand::Vrfy);
    }

    #[test]
    fn test_unknown() {
        assert_eq!(
            SmtpCommand::parse("FOO bar"),
            SmtpCommand::Unknown("FOO bar".to_string())
        );
        assert_eq!(SmtpCommand::Unknown("x".to_string()).verb(), "");
    }

    #[test]
    fn test_size_param_ignores_garbage() {
        assert_eq!(
            SmtpCommand::parse("MAIL FROM:<s@ex.org> SIZE=notanumber"),
            SmtpCommand::MailFrom {
                address: "s@ex.org".to_string(),
                declared_size: None
            }
        );
        assert_eq!(
            SmtpCommand::parse("MAIL FROM:<s@ex.org> BODY=8BITMIME SIZE=77"),
            SmtpCommand::MailFrom {
                address: "s@ex.org".to_string(),
                declared_size: Some(77)
            }
        );
    }
}
