use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;
use tracing::debug;

use warden_application::MembershipGateway;
use warden_core::{AppError, AppResult, GroupId};
use warden_domain::{Capability, HierarchyRanks, MembershipId, SubjectId};

const ADMINISTRATOR_BIT: u64 = 1 << 3;
const MANAGE_ROLES_BIT: u64 = 1 << 28;
const AUDIT_LOG_REASON: &str = "temporary restriction";

/// Membership gateway speaking a Discord-compatible REST API with a bot token.
pub struct HttpMembershipGateway {
    http_client: reqwest::Client,
    base_url: String,
    bot_token: String,
    max_attempts: u8,
    retry_backoff_ms: u64,
    enforcing_identity: OnceCell<SubjectId>,
}

#[derive(Debug, Deserialize)]
struct MemberPayload {
    #[serde(default)]
    roles: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RolePayload {
    id: String,
    position: i64,
    #[serde(default)]
    permissions: String,
}

#[derive(Debug, Deserialize)]
struct GroupPayload {
    owner_id: String,
}

#[derive(Debug, Deserialize)]
struct UserPayload {
    id: String,
}

impl HttpMembershipGateway {
    /// Creates a gateway rooted at `base_url`, e.g. `https://discord.com/api/v10`.
    #[must_use]
    pub fn new(
        http_client: reqwest::Client,
        base_url: impl Into<String>,
        bot_token: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            bot_token: bot_token.into(),
            max_attempts: 3,
            retry_backoff_ms: 250,
            enforcing_identity: OnceCell::new(),
        }
    }

    /// Overrides how often rate-limited or failing requests are retried.
    #[must_use]
    pub fn with_retry_policy(mut self, max_attempts: u8, retry_backoff_ms: u64) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.retry_backoff_ms = retry_backoff_ms.max(50);
        self
    }

    fn member_role_url(
        &self,
        group_id: &GroupId,
        subject_id: &SubjectId,
        membership_id: &MembershipId,
    ) -> String {
        format!(
            "{}/guilds/{group_id}/members/{subject_id}/roles/{membership_id}",
            self.base_url
        )
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        operation: &str,
    ) -> AppResult<reqwest::Response> {
        let mut attempt = 0_u8;
        let mut last_error = String::new();

        while attempt < self.max_attempts {
            attempt = attempt.saturating_add(1);
            let response = self
                .http_client
                .request(method.clone(), url)
                .header(
                    reqwest::header::AUTHORIZATION,
                    format!("Bot {}", self.bot_token),
                )
                .header("X-Audit-Log-Reason", AUDIT_LOG_REASON)
                .send()
                .await;

            match response {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response)
                    if response.status().is_server_error()
                        || response.status() == StatusCode::TOO_MANY_REQUESTS =>
                {
                    last_error = format!("transient HTTP status {}", response.status());
                    debug!(operation, attempt, status = %response.status(), "platform request will be retried");
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "<response body unavailable>".to_owned());
                    if status == StatusCode::NOT_FOUND {
                        return Err(AppError::NotFound(format!(
                            "{operation} returned 404: {body}"
                        )));
                    }
                    return Err(AppError::Internal(format!(
                        "{operation} failed with status {status}: {body}"
                    )));
                }
                Err(error) => {
                    last_error = format!("transport error: {error}");
                }
            }

            if attempt < self.max_attempts {
                let delay = self.retry_backoff_ms.saturating_mul(u64::from(attempt));
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
        }

        Err(AppError::Internal(format!(
            "{operation} failed after {} attempts: {last_error}",
            self.max_attempts
        )))
    }

    async fn fetch_json<T: DeserializeOwned>(&self, url: &str, operation: &str) -> AppResult<T> {
        self.send(Method::GET, url, operation)
            .await?
            .json::<T>()
            .await
            .map_err(|error| AppError::Internal(format!("{operation} returned invalid JSON: {error}")))
    }

    async fn member_roles(&self, group_id: &GroupId, member_id: &str) -> AppResult<Vec<String>> {
        let url = format!("{}/guilds/{group_id}/members/{member_id}", self.base_url);
        let member: MemberPayload = self.fetch_json(&url, "member lookup").await?;
        Ok(member.roles)
    }

    async fn group_roles(&self, group_id: &GroupId) -> AppResult<Vec<RolePayload>> {
        let url = format!("{}/guilds/{group_id}/roles", self.base_url);
        self.fetch_json(&url, "role listing").await
    }
}

#[async_trait]
impl MembershipGateway for HttpMembershipGateway {
    async fn add_membership(
        &self,
        group_id: &GroupId,
        subject_id: &SubjectId,
        membership_id: &MembershipId,
    ) -> AppResult<()> {
        let url = self.member_role_url(group_id, subject_id, membership_id);
        self.send(Method::PUT, &url, "role grant").await?;
        Ok(())
    }

    async fn remove_membership(
        &self,
        group_id: &GroupId,
        subject_id: &SubjectId,
        membership_id: &MembershipId,
    ) -> AppResult<()> {
        let url = self.member_role_url(group_id, subject_id, membership_id);
        self.send(Method::DELETE, &url, "role removal").await?;
        Ok(())
    }

    async fn list_memberships(
        &self,
        group_id: &GroupId,
        subject_id: &SubjectId,
    ) -> AppResult<Vec<MembershipId>> {
        self.member_roles(group_id, subject_id.as_str())
            .await?
            .into_iter()
            .map(MembershipId::new)
            .collect()
    }

    async fn hierarchy_ranks(&self, group_id: &GroupId) -> AppResult<HierarchyRanks> {
        let roles = self.group_roles(group_id).await?;
        rank_table(roles)
    }

    async fn enforcing_identity(&self) -> AppResult<SubjectId> {
        let identity = self
            .enforcing_identity
            .get_or_try_init(|| async {
                let url = format!("{}/users/@me", self.base_url);
                let user: UserPayload = self.fetch_json(&url, "bot identity lookup").await?;
                SubjectId::new(user.id)
            })
            .await?;
        Ok(identity.clone())
    }

    async fn actor_capabilities(
        &self,
        group_id: &GroupId,
        actor_id: &str,
    ) -> AppResult<Vec<Capability>> {
        let url = format!("{}/guilds/{group_id}", self.base_url);
        let group: GroupPayload = self.fetch_json(&url, "group lookup").await?;
        if group.owner_id == actor_id {
            return Ok(vec![Capability::Administrator]);
        }

        let held = self.member_roles(group_id, actor_id).await?;
        let roles = self.group_roles(group_id).await?;
        let bits = roles
            .iter()
            .filter(|role| role.id == group_id.as_str() || held.contains(&role.id))
            .map(|role| parse_permission_bits(&role.permissions))
            .collect::<AppResult<Vec<_>>>()?
            .into_iter()
            .fold(0_u64, |acc, bits| acc | bits);

        Ok(capabilities_from_bits(bits))
    }
}

fn rank_table(roles: Vec<RolePayload>) -> AppResult<HierarchyRanks> {
    let ranks = roles
        .into_iter()
        .map(|role| -> AppResult<(MembershipId, i64)> {
            Ok((MembershipId::new(role.id)?, role.position))
        })
        .collect::<AppResult<Vec<_>>>()?;
    Ok(HierarchyRanks::new(ranks))
}

fn parse_permission_bits(value: &str) -> AppResult<u64> {
    if value.is_empty() {
        return Ok(0);
    }
    value.parse::<u64>().map_err(|error| {
        AppError::Internal(format!("role permissions '{value}' are not a bit set: {error}"))
    })
}

fn capabilities_from_bits(bits: u64) -> Vec<Capability> {
    let mut capabilities = Vec::new();
    if bits & ADMINISTRATOR_BIT != 0 {
        capabilities.push(Capability::Administrator);
    }
    if bits & MANAGE_ROLES_BIT != 0 {
        capabilities.push(Capability::ManageMemberships);
    }
    capabilities
}

#[cfg(test)]
mod tests;
