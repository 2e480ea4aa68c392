use std::str::FromStr;

use ipnet::IpNet;
use nodeconductor_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Transport protocol of a firewall rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityProtocol {
    /// TCP port range.
    Tcp,
    /// UDP port range.
    Udp,
    /// ICMP type and code.
    Icmp,
}

impl SecurityProtocol {
    /// Returns a stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
            Self::Icmp => "icmp",
        }
    }
}

impl FromStr for SecurityProtocol {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "tcp" => Ok(Self::Tcp),
            "udp" => Ok(Self::Udp),
            "icmp" => Ok(Self::Icmp),
            _ => Err(AppError::Validation(format!(
                "wrong value for \"protocol\": expected one of (tcp, udp, icmp), found {value}"
            ))),
        }
    }
}

/// Single ingress rule.
///
/// For ICMP rules `from_port` holds the ICMP type and `to_port` the ICMP code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroupRule {
    /// Protocol.
    pub protocol: SecurityProtocol,
    /// First port, or ICMP type.
    pub from_port: i32,
    /// Last port, or ICMP code.
    pub to_port: i32,
    /// Source network.
    pub cidr: IpNet,
}

impl SecurityGroupRule {
    /// Creates a validated rule.
    pub fn new(
        protocol: SecurityProtocol,
        from_port: i32,
        to_port: i32,
        cidr: &str,
    ) -> AppResult<Self> {
        match protocol {
            SecurityProtocol::Icmp => {
                check_range("icmp_type", from_port, -1, 255)?;
                check_range("icmp_code", to_port, -1, 255)?;
            }
            SecurityProtocol::Tcp | SecurityProtocol::Udp => {
                check_range("from_port", from_port, 1, 65535)?;
                check_range("to_port", to_port, 1, 65535)?;
                if to_port < from_port {
                    return Err(AppError::Validation(format!(
                        "wrong value for \"to_port\": expected value not less than from_port ({from_port}), found {to_port}"
                    )));
                }
            }
        }

        let cidr = IpNet::from_str(cidr)
            .map_err(|error| AppError::Validation(format!("invalid cidr '{cidr}': {error}")))?;

        Ok(Self {
            protocol,
            from_port,
            to_port,
            cidr,
        })
    }
}

fn check_range(key: &str, value: i32, min: i32, max: i32) -> AppResult<()> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "wrong value for \"{key}\": expected value in range [{min}, {max}], found {value}"
        )))
    }
}

/// Security group attached to a cloud-project membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroup {
    /// Stable identifier.
    pub id: Uuid,
    /// Owning membership.
    pub membership_id: Uuid,
    /// Group name.
    pub name: NonEmptyString,
    /// Optional description.
    pub description: Option<String>,
    /// Ingress rules.
    pub rules: Vec<SecurityGroupRule>,
}

/// Security group created for every new membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityGroupTemplate {
    /// Group name.
    pub name: NonEmptyString,
    /// Description.
    pub description: String,
    /// Ingress rules.
    pub rules: Vec<SecurityGroupRule>,
}

impl SecurityGroupTemplate {
    /// Materializes the template for a membership.
    #[must_use]
    pub fn instantiate(&self, membership_id: Uuid) -> SecurityGroup {
        SecurityGroup {
            id: Uuid::new_v4(),
            membership_id,
            name: self.name.clone(),
            description: Some(self.description.clone()),
            rules: self.rules.clone(),
        }
    }
}

/// Parses the configured default security groups.
///
/// Misconfigured groups are skipped; one message per skipped group is returned
/// next to the valid templates.
pub fn parse_default_security_groups(
    raw: &str,
) -> AppResult<(Vec<SecurityGroupTemplate>, Vec<String>)> {
    let value: Value = serde_json::from_str(raw).map_err(|error| {
        AppError::Validation(format!("default security groups must be JSON: {error}"))
    })?;
    let Value::Array(groups) = value else {
        return Err(AppError::Validation(
            "default security groups must be a JSON array".to_owned(),
        ));
    };

    let mut templates = Vec::new();
    let mut skipped = Vec::new();
    for group in &groups {
        match parse_group(group) {
            Ok(template) => templates.push(template),
            Err(message) => skipped.push(message),
        }
    }

    Ok((templates, skipped))
}

fn parse_group(group: &Value) -> Result<SecurityGroupTemplate, String> {
    let name = string_field(group, "name")?;
    let description = string_field(group, "description")?;
    let rules = match group.get("rules") {
        Some(Value::Array(rules)) => rules,
        Some(other) => {
            return Err(format!(
                "wrong type for \"rules\": expected list, found {}",
                json_type(other)
            ));
        }
        None => return Err("parameter \"rules\" not found".to_owned()),
    };

    let rules = rules
        .iter()
        .map(parse_rule)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SecurityGroupTemplate {
        name: NonEmptyString::new(name).map_err(|error| error.to_string())?,
        description: description.to_owned(),
        rules,
    })
}

fn parse_rule(rule: &Value) -> Result<SecurityGroupRule, String> {
    let protocol =
        SecurityProtocol::from_str(string_field(rule, "protocol")?).map_err(|e| e.to_string())?;
    let (from_key, to_key) = match protocol {
        SecurityProtocol::Icmp => ("icmp_type", "icmp_code"),
        SecurityProtocol::Tcp | SecurityProtocol::Udp => ("from_port", "to_port"),
    };
    let from_port = int_field(rule, from_key)?;
    let to_port = int_field(rule, to_key)?;
    let cidr = string_field(rule, "cidr")?;

    SecurityGroupRule::new(protocol, from_port, to_port, cidr).map_err(|error| error.to_string())
}

fn string_field<'a>(value: &'a Value, key: &str) -> Result<&'a str, String> {
    match value.get(key) {
        Some(Value::String(text)) => Ok(text),
        Some(other) => Err(format!(
            "wrong type for \"{key}\": expected string, found {}",
            json_type(other)
        )),
        None => Err(format!("parameter \"{key}\" not found")),
    }
}

fn int_field(value: &Value, key: &str) -> Result<i32, String> {
    match value.get(key) {
        Some(Value::Number(number)) => number
            .as_i64()
            .and_then(|number| i32::try_from(number).ok())
            .ok_or_else(|| format!("wrong type for \"{key}\": expected int, found {number}")),
        Some(other) => Err(format!(
            "wrong type for \"{key}\": expected int, found {}",
            json_type(other)
        )),
        None => Err(format!("parameter \"{key}\" not found")),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
