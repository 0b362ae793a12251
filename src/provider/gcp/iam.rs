//! # IAM REST Client
//!
//! Service-account creation (IAM API v1) and project role bindings (Cloud
//! Resource Manager v1 `getIamPolicy` / `setIamPolicy`).
//!
//! Role binding is a read-modify-write of the whole project policy. Fields this
//! client does not model (audit configs, conditions) are carried through
//! untouched, and the `etag` from the read guards against concurrent writers.
//! The policy is always read as version 3 so conditional bindings survive the
//! write.

use super::common::{format_project_path, OperationTracker};
use super::rest::RestClient;
use crate::constants::IAM_POLICY_VERSION;
use crate::error::ProviderError;
use crate::provider::IamAdmin;
use async_trait::async_trait;
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{field, info, info_span, Instrument};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateServiceAccountRequest<'a> {
    account_id: &'a str,
    service_account: ServiceAccountFields<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ServiceAccountFields<'a> {
    display_name: &'a str,
}

/// Project IAM policy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bindings: Vec<Binding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// One role and its members
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    pub role: String,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Value>,
}

impl Policy {
    /// Add `member` to the unconditional binding for `role`
    /// Returns false if the member was already bound
    pub fn add_member(&mut self, role: &str, member: &str) -> bool {
        match self
            .bindings
            .iter_mut()
            .find(|b| b.role == role && b.condition.is_none())
        {
            Some(binding) if binding.members.iter().any(|m| m == member) => false,
            Some(binding) => {
                binding.members.push(member.to_string());
                true
            }
            None => {
                self.bindings.push(Binding {
                    role: role.to_string(),
                    members: vec![member.to_string()],
                    condition: None,
                });
                true
            }
        }
    }

    /// Raise the version to 3 when any binding is conditional
    ///
    /// `setIamPolicy` rejects conditional bindings in a policy marked as
    /// version 1, which is what an older policy read can report.
    pub fn settle_version(&mut self) {
        if self.bindings.iter().any(|b| b.condition.is_some()) {
            self.version = Some(IAM_POLICY_VERSION);
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GetIamPolicyRequest {
    options: GetPolicyOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GetPolicyOptions {
    requested_policy_version: i64,
}

impl GetIamPolicyRequest {
    fn conditional() -> Self {
        Self {
            options: GetPolicyOptions {
                requested_policy_version: IAM_POLICY_VERSION,
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct SetIamPolicyRequest<'a> {
    policy: &'a Policy,
}

#[derive(Debug)]
pub struct IamRest {
    iam: RestClient,
    resource_manager: RestClient,
    project_id: String,
}

impl IamRest {
    /// `iam` targets iam.googleapis.com, `resource_manager` targets
    /// cloudresourcemanager.googleapis.com
    #[must_use]
    pub fn new(
        iam: RestClient,
        resource_manager: RestClient,
        project_id: impl Into<String>,
    ) -> Self {
        Self {
            iam,
            resource_manager,
            project_id: project_id.into(),
        }
    }
}

#[async_trait]
impl IamAdmin for IamRest {
    async fn ensure_service_account(
        &self,
        account_id: &str,
        display_name: &str,
    ) -> Result<bool, ProviderError> {
        let tracker = OperationTracker::new(info_span!(
            "gcp.iam.create_service_account",
            account.id = account_id,
            project.id = %self.project_id,
            operation.success = field::Empty,
            operation.duration_ms = field::Empty,
            error.message = field::Empty,
        ));
        let span = tracker.span().clone();

        let result = async {
            let request = CreateServiceAccountRequest {
                account_id,
                service_account: ServiceAccountFields { display_name },
            };
            match self
                .iam
                .post::<_, IgnoredAny>(
                    &format!("{}/serviceAccounts", format_project_path(&self.project_id)),
                    &request,
                )
                .await
            {
                Ok(_) => {
                    info!("Created service account: {}", account_id);
                    Ok(true)
                }
                Err(e) if e.is_already_exists() => {
                    info!("Service account {} already exists", account_id);
                    Ok(false)
                }
                Err(e) => Err(e),
            }
        }
        .instrument(span)
        .await;

        tracker.finish(result)
    }

    async fn grant_project_roles(
        &self,
        member: &str,
        roles: &[&str],
    ) -> Result<usize, ProviderError> {
        let tracker = OperationTracker::new(info_span!(
            "gcp.iam.grant_project_roles",
            member = member,
            project.id = %self.project_id,
            operation.success = field::Empty,
            operation.duration_ms = field::Empty,
            error.message = field::Empty,
        ));
        let span = tracker.span().clone();
        let project_path = format_project_path(&self.project_id);

        let result = async {
            let mut policy: Policy = self
                .resource_manager
                .post(
                    &format!("{project_path}:getIamPolicy"),
                    &GetIamPolicyRequest::conditional(),
                )
                .await?;

            let mut added = 0;
            for role in roles {
                if policy.add_member(role, member) {
                    added += 1;
                }
            }

            if added == 0 {
                info!("All {} roles already bound to {}", roles.len(), member);
                return Ok(0);
            }

            policy.settle_version();
            self.resource_manager
                .post::<_, IgnoredAny>(
                    &format!("{project_path}:setIamPolicy"),
                    &SetIamPolicyRequest { policy: &policy },
                )
                .await?;
            info!("Bound {} new roles to {}", added, member);
            Ok::<_, ProviderError>(added)
        }
        .instrument(span)
        .await;

        tracker.finish(result)
    }
}
