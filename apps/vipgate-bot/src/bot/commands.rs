use vipgate_db::models::ReportSubmission;

/// Admin commands that carry an id suffix, e.g. `/aprobar_12`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminVerb {
    Approve,
    Reject,
    Deactivate,
}

impl AdminVerb {
    const ALL: [AdminVerb; 3] = [AdminVerb::Approve, AdminVerb::Reject, AdminVerb::Deactivate];

    pub fn prefix(&self) -> &'static str {
        match self {
            AdminVerb::Approve => "/aprobar_",
            AdminVerb::Reject => "/rechazar_",
            AdminVerb::Deactivate => "/desactivar_",
        }
    }

    pub fn usage(&self) -> &'static str {
        match self {
            AdminVerb::Approve => "/aprobar_&lt;id&gt;",
            AdminVerb::Reject => "/rechazar_&lt;id&gt;",
            AdminVerb::Deactivate => "/desactivar_&lt;user_id&gt;",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Vip,
    Pago,
    Status,
    ListPending,
    Approve(i64),
    Reject(i64),
    Deactivate(i64),
    /// Admin prefix followed by something that is not an id.
    MalformedAdmin(AdminVerb),
    /// Free text carrying a payment report, `tx_hash;amount;network;note`.
    ReportLine(String),
    Unknown,
}

impl Command {
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if !text.starts_with('/') {
            if text.contains(ReportSubmission::DELIMITER) {
                return Command::ReportLine(text.to_string());
            }
            return Command::Unknown;
        }

        let head = text.split_whitespace().next().unwrap_or(text);
        // `/status@my_bot` in group chats
        let head = head.split('@').next().unwrap_or(head);

        match head {
            "/start" => return Command::Start,
            "/help" => return Command::Help,
            "/vip" => return Command::Vip,
            "/pago" => return Command::Pago,
            "/status" => return Command::Status,
            "/list_pending" => return Command::ListPending,
            _ => {}
        }

        for verb in AdminVerb::ALL {
            if let Some(raw_id) = head.strip_prefix(verb.prefix()) {
                return match raw_id.parse::<i64>() {
                    Ok(id) => match verb {
                        AdminVerb::Approve => Command::Approve(id),
                        AdminVerb::Reject => Command::Reject(id),
                        AdminVerb::Deactivate => Command::Deactivate(id),
                    },
                    Err(_) => Command::MalformedAdmin(verb),
                };
            }
        }

        Command::Unknown
    }

    pub fn is_admin_only(&self) -> bool {
        matches!(
            self,
            Command::ListPending
                | Command::Approve(_)
                | Command::Reject(_)
                | Command::Deactivate(_)
                | Command::MalformedAdmin(_)
        )
    }
}
