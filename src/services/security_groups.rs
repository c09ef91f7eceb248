use crate::errors::AppError;
use crate::models::security_group::{
    IpPermission, IpRange, RuleDirection, RuleEndpoint, SecurityGroupRule, UserIdGroupPair,
};
use crate::models::{EntityKind, ServiceInstance, ServiceStatus};
use crate::orchestrator::SecurityGroupDetail;
use crate::services::Ctx;
use crate::tasks;
use crate::utils::regex;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

/// Wildcard sentinel: protocol `-1` means every protocol on every port.
const ALL_PROTOCOLS: &str = "-1";

/// A rule half-pair plus its encoded service string, ready for the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedRule {
    pub source: RuleEndpoint,
    pub destination: RuleEndpoint,
    pub service: String,
}

/// Encodes the `<proto>:<port-expr>` service string for a rule filter.
///
/// Port handling follows the inbound contract: `-1` as protocol demands the
/// `-1` port sentinel on both ends, ICMP collapses its code into FromPort,
/// and reversed ranges are rejected.
pub fn encode_service(perm: &IpPermission) -> Result<String, AppError> {
    let proto = normalize_protocol(&perm.ip_protocol)?;
    let from = perm.from_port;
    let to = perm.to_port;

    if proto == ALL_PROTOCOLS {
        let sentinel_ok = matches!(from, None | Some(-1)) && matches!(to, None | Some(-1));
        if !sentinel_ok {
            return Err(AppError::bad_request(
                "IpProtocol -1 requires FromPort and ToPort to both be -1",
            ));
        }
        return Ok("*:*".to_string());
    }

    if proto == "icmp" {
        // The single ICMP code travels in FromPort; ToPort is forced equal.
        let code = from.unwrap_or(-1);
        return Ok(format!("icmp:{}", code));
    }

    let port_expr = match (from, to) {
        (None, None) => "*".to_string(),
        (Some(from), Some(to)) if from == to => validate_port(from).map(|p| p.to_string())?,
        (Some(from), Some(to)) => {
            if from > to {
                return Err(AppError::bad_request(format!(
                    "FromPort {} is greater than ToPort {}",
                    from, to
                )));
            }
            format!("{}-{}", validate_port(from)?, validate_port(to)?)
        }
        _ => {
            return Err(AppError::bad_request(
                "FromPort and ToPort must be supplied together",
            ))
        }
    };

    Ok(format!("{}:{}", proto, port_expr))
}

fn validate_port(port: i32) -> Result<i32, AppError> {
    if (0..=65535).contains(&port) {
        Ok(port)
    } else {
        Err(AppError::bad_request(format!(
            "Port {} is outside 0-65535",
            port
        )))
    }
}

fn normalize_protocol(protocol: &str) -> Result<&'static str, AppError> {
    match protocol {
        "-1" => Ok(ALL_PROTOCOLS),
        "tcp" | "6" => Ok("tcp"),
        "udp" | "17" => Ok("udp"),
        "icmp" | "1" => Ok("icmp"),
        other => Err(AppError::bad_request(format!(
            "Unsupported IpProtocol '{}'",
            other
        ))),
    }
}

/// The peer endpoints named by a rule filter. Exactly one source kind must
/// be present: group references or IP ranges, never neither, never both.
pub fn peer_endpoints(perm: &IpPermission) -> Result<Vec<PeerRef>, AppError> {
    let has_groups = !perm.user_id_group_pairs.is_empty();
    let has_cidrs = !perm.ip_ranges.is_empty() || !perm.ipv6_ranges.is_empty();

    match (has_groups, has_cidrs) {
        (true, true) => Err(AppError::bad_request(
            "Specify either UserIdGroupPairs or IpRanges, not both",
        )),
        (false, false) => Err(AppError::bad_request(
            "One of UserIdGroupPairs or IpRanges is required",
        )),
        (true, false) => Ok(perm
            .user_id_group_pairs
            .iter()
            .map(|pair| PeerRef::Group(pair.group_id.clone()))
            .collect()),
        (false, true) => {
            let mut peers: Vec<PeerRef> = perm
                .ip_ranges
                .iter()
                .map(|range| PeerRef::Cidr(range.cidr_ip.clone()))
                .collect();
            peers.extend(
                perm.ipv6_ranges
                    .iter()
                    .map(|range| PeerRef::Cidr(range.cidr_ipv6.clone())),
            );
            for peer in &peers {
                if let PeerRef::Cidr(cidr) = peer {
                    if !regex::CIDR_V4.is_match(cidr) && !cidr.contains(':') {
                        return Err(AppError::bad_request(format!("Invalid CIDR '{}'", cidr)));
                    }
                }
            }
            Ok(peers)
        }
    }
}

/// Peer reference before resolution against the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerRef {
    Group(String),
    Cidr(String),
}

/// Builds the backend rule set for a filter: owning group on the side the
/// direction dictates, one rule per peer.
pub fn build_rules(
    direction: RuleDirection,
    owner: &RuleEndpoint,
    peers: Vec<RuleEndpoint>,
    service: &str,
) -> Vec<EncodedRule> {
    peers
        .into_iter()
        .map(|peer| match direction {
            RuleDirection::Egress => EncodedRule {
                source: owner.clone(),
                destination: peer,
                service: service.to_string(),
            },
            RuleDirection::Ingress => EncodedRule {
                source: peer,
                destination: owner.clone(),
                service: service.to_string(),
            },
        })
        .collect()
}

/// Inverse of the encoding: backend rule → AWS-shaped permission entry, from
/// the perspective of the owning group.
pub fn decode_rule(
    rule: &SecurityGroupRule,
    owner_resource: &str,
) -> (RuleDirection, IpPermission) {
    let (direction, peer) = match (&rule.source, &rule.destination) {
        (RuleEndpoint::SecurityGroup(src), _) if src == owner_resource => {
            (RuleDirection::Egress, rule.destination.clone())
        }
        _ => (RuleDirection::Ingress, rule.source.clone()),
    };

    let mut perm = IpPermission::default();
    let (proto, port_expr) = rule
        .service
        .split_once(':')
        .unwrap_or((rule.service.as_str(), "*"));
    perm.ip_protocol = if proto == "*" {
        ALL_PROTOCOLS.to_string()
    } else {
        proto.to_string()
    };
    match port_expr {
        "*" => {}
        // single values first: "-1" would otherwise read as an empty range
        expr => {
            if let Ok(port) = expr.parse::<i32>() {
                perm.from_port = Some(port);
                perm.to_port = Some(port);
            } else if let Some((from, to)) = expr.split_once('-') {
                perm.from_port = from.parse().ok();
                perm.to_port = to.parse().ok();
            }
        }
    }
    if proto == "icmp" {
        perm.to_port = perm.from_port;
    }

    match peer {
        RuleEndpoint::SecurityGroup(group) => {
            perm.user_id_group_pairs = vec![UserIdGroupPair {
                group_id: group,
                user_id: None,
            }];
        }
        RuleEndpoint::Cidr(cidr) => {
            perm.ip_ranges = vec![IpRange {
                cidr_ip: cidr,
                description: None,
            }];
        }
    }

    (direction, perm)
}

// ---- plugin operations ----

pub async fn create_security_group(
    ctx: &Ctx<'_>,
    name: &str,
    desc: &str,
    vpc_id: Uuid,
    template: Option<&str>,
) -> Result<ServiceInstance, AppError> {
    let vpc = ctx
        .store
        .get(vpc_id)
        .filter(|r| r.kind == EntityKind::Vpc && r.account_id == ctx.account_id)
        .ok_or_else(|| AppError::not_found(format!("Vpc '{}' not found", vpc_id)))?;
    let vpc_resource = vpc
        .resource_uuid
        .ok_or_else(|| AppError::conflict(format!("Vpc '{}' has no backend resource", vpc_id)))?;

    let record = ServiceInstance::new(EntityKind::SecurityGroup, name, &ctx.account_id)
        .with_parent(vpc_id)
        .with_config(json!({ "desc": desc, "template": template }));
    let record_id = ctx.store.insert(record);
    ctx.store.set_status(record_id, ServiceStatus::Pending);

    let payload = json!({
        "name": name,
        "desc": desc,
        "vpc": vpc_resource,
        "template": template,
    });

    let created = match ctx.orchestrator.create_security_group(&payload).await {
        Ok(created) => created,
        Err(err) => {
            ctx.store.set_error(record_id, err.to_string());
            return Err(err.into());
        }
    };
    ctx.store.set_resource_uuid(record_id, created.uuid);

    if let Err(err) = tasks::wait_if_task(
        ctx.orchestrator,
        created.taskid.as_deref(),
        ctx.config.task_timeout(),
        ctx.config.poll_interval(),
    )
    .await
    {
        ctx.store.set_error(record_id, err.to_string());
        return Err(err.into());
    }

    info!(group = %record_id, resource = %created.uuid, "security group created");
    Ok(ctx
        .store
        .set_status(record_id, ServiceStatus::Active)
        .expect("record inserted above"))
}

pub async fn delete_security_group(ctx: &Ctx<'_>, group_id: Uuid) -> Result<(), AppError> {
    let group = get_owned_group(ctx, group_id)?;

    // an instance references the group through its config
    let referencing = ctx
        .store
        .list(&ctx.account_id, EntityKind::Instance)
        .into_iter()
        .filter(|r| r.is_live())
        .filter(|r| instance_references_group(r, group_id))
        .count();
    if referencing > 0 {
        return Err(AppError::conflict(format!(
            "Security group '{}' is in use by {} instance(s)",
            group_id, referencing
        )));
    }

    ctx.store.set_status(group_id, ServiceStatus::Deleting);

    let resource = group.resource_uuid;
    if let Some(resource) = resource {
        let taskid = match ctx.orchestrator.delete_security_group(resource).await {
            Ok(taskid) => taskid,
            Err(err) => {
                ctx.store.set_error(group_id, err.to_string());
                return Err(err.into());
            }
        };
        if let Err(err) = tasks::wait_if_task(
            ctx.orchestrator,
            taskid.as_deref(),
            ctx.config.task_timeout(),
            ctx.config.poll_interval(),
        )
        .await
        {
            ctx.store.set_error(group_id, err.to_string());
            return Err(err.into());
        }
    }

    ctx.store.set_status(group_id, ServiceStatus::Terminated);
    Ok(())
}

pub struct GroupView {
    pub record: ServiceInstance,
    pub ingress: Vec<IpPermission>,
    pub egress: Vec<IpPermission>,
}

pub async fn describe_security_groups(
    ctx: &Ctx<'_>,
    group_ids: &[Uuid],
) -> Result<Vec<GroupView>, AppError> {
    let mut views = Vec::new();
    for record in ctx.store.list(&ctx.account_id, EntityKind::SecurityGroup) {
        if !group_ids.is_empty() && !group_ids.contains(&record.id) {
            continue;
        }
        if !record.is_live() {
            continue;
        }

        let mut ingress = Vec::new();
        let mut egress = Vec::new();
        if let Some(resource) = record.resource_uuid {
            let detail = ctx.orchestrator.security_group_detail(resource).await?;
            let owner = resource.to_string();
            for rule in &detail.rules {
                match decode_rule(rule, &owner) {
                    (RuleDirection::Ingress, perm) => ingress.push(perm),
                    (RuleDirection::Egress, perm) => egress.push(perm),
                }
            }
        }
        views.push(GroupView {
            record,
            ingress,
            egress,
        });
    }
    Ok(views)
}

pub async fn authorize_rule(
    ctx: &Ctx<'_>,
    direction: RuleDirection,
    group_id: Uuid,
    perm: &IpPermission,
) -> Result<(), AppError> {
    let group = get_owned_group(ctx, group_id)?;
    let resource = group
        .resource_uuid
        .ok_or_else(|| AppError::conflict(format!("Security group '{}' is not ready", group_id)))?;

    let service = encode_service(perm)?;
    let peers = resolve_peers(ctx, peer_endpoints(perm)?)?;
    let owner = RuleEndpoint::SecurityGroup(resource.to_string());
    let rules = build_rules(direction, &owner, peers, &service);

    let detail = ctx.orchestrator.security_group_detail(resource).await?;
    for rule in &rules {
        if find_existing(&detail, rule).is_some() {
            return Err(AppError::conflict(format!(
                "Rule {} already exists on security group '{}'",
                rule.service, group_id
            )));
        }
    }

    for rule in &rules {
        let payload = json!({
            "source": &rule.source,
            "destination": &rule.destination,
            "service": &rule.service,
        });
        let created = ctx.orchestrator.create_rule(resource, &payload).await?;
        tasks::wait_if_task(
            ctx.orchestrator,
            created.taskid.as_deref(),
            ctx.config.task_timeout(),
            ctx.config.poll_interval(),
        )
        .await?;
    }

    info!(group = %group_id, count = rules.len(), "rules authorized");
    Ok(())
}

pub async fn revoke_rule(
    ctx: &Ctx<'_>,
    direction: RuleDirection,
    group_id: Uuid,
    perm: &IpPermission,
) -> Result<usize, AppError> {
    let group = get_owned_group(ctx, group_id)?;
    let resource = group
        .resource_uuid
        .ok_or_else(|| AppError::conflict(format!("Security group '{}' is not ready", group_id)))?;

    let service = encode_service(perm)?;
    let peers = peer_endpoints(perm)?;

    // TODO: CIDR-based revoke matching is not applied here; rules created
    // from IpRanges can currently only be removed by group reference.
    // Confirm the intended matching semantics before enabling it.
    let group_peers: Vec<RuleEndpoint> = peers
        .into_iter()
        .filter_map(|peer| match peer {
            PeerRef::Group(group) => Some(group),
            PeerRef::Cidr(_) => None,
        })
        .map(|group| resolve_group_ref(ctx, &group))
        .collect::<Result<_, _>>()?;

    let owner = RuleEndpoint::SecurityGroup(resource.to_string());
    let candidates = build_rules(direction, &owner, group_peers, &service);

    let detail = ctx.orchestrator.security_group_detail(resource).await?;
    let mut matched = Vec::new();
    for candidate in &candidates {
        if let Some(existing) = find_existing(&detail, candidate) {
            matched.push(existing.clone());
        }
    }

    if matched.is_empty() {
        return Err(AppError::not_found(format!(
            "No matching rule on security group '{}'",
            group_id
        )));
    }

    // Reserved template rules are immutable through this path; refuse before
    // any backend delete is issued.
    if let Some(reserved) = matched.iter().find(|rule| rule.reserved) {
        return Err(AppError::bad_request(format!(
            "Rule '{}' was created from a template and cannot be deleted",
            reserved.id
        )));
    }

    for rule in &matched {
        let taskid = ctx.orchestrator.delete_rule(resource, rule.id).await?;
        tasks::wait_if_task(
            ctx.orchestrator,
            taskid.as_deref(),
            ctx.config.task_timeout(),
            ctx.config.poll_interval(),
        )
        .await?;
    }

    info!(group = %group_id, count = matched.len(), "rules revoked");
    Ok(matched.len())
}

fn find_existing<'a>(
    detail: &'a SecurityGroupDetail,
    candidate: &EncodedRule,
) -> Option<&'a SecurityGroupRule> {
    detail.rules.iter().find(|rule| {
        rule.source == candidate.source
            && rule.destination == candidate.destination
            && rule.service == candidate.service
    })
}

fn get_owned_group(ctx: &Ctx<'_>, group_id: Uuid) -> Result<ServiceInstance, AppError> {
    ctx.store
        .get(group_id)
        .filter(|r| r.kind == EntityKind::SecurityGroup && r.account_id == ctx.account_id)
        .filter(|r| r.is_live())
        .ok_or_else(|| AppError::not_found(format!("Security group '{}' not found", group_id)))
}

fn resolve_peers(ctx: &Ctx<'_>, peers: Vec<PeerRef>) -> Result<Vec<RuleEndpoint>, AppError> {
    peers
        .into_iter()
        .map(|peer| match peer {
            PeerRef::Group(group) => resolve_group_ref(ctx, &group),
            PeerRef::Cidr(cidr) => Ok(RuleEndpoint::Cidr(cidr)),
        })
        .collect()
}

/// Maps an API-level group id onto the backend resource reference.
fn resolve_group_ref(ctx: &Ctx<'_>, group_id: &str) -> Result<RuleEndpoint, AppError> {
    let id = Uuid::parse_str(group_id)
        .map_err(|_| AppError::bad_request(format!("Invalid GroupId '{}'", group_id)))?;
    let record = get_owned_group(ctx, id)?;
    let resource = record
        .resource_uuid
        .ok_or_else(|| AppError::conflict(format!("Security group '{}' is not ready", group_id)))?;
    Ok(RuleEndpoint::SecurityGroup(resource.to_string()))
}

pub fn instance_references_group(record: &ServiceInstance, group_id: Uuid) -> bool {
    record
        .config
        .get("security_group_ids")
        .and_then(|v| v.as_array())
        .is_some_and(|ids| {
            ids.iter()
                .filter_map(|v| v.as_str())
                .filter_map(|s| Uuid::parse_str(s).ok())
                .any(|id| id == group_id)
        })
}

#[cfg(test)]
#[path = "security_groups_tests.rs"]
mod tests;
