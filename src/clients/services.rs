use std::collections::HashMap;

use tracing::{debug, instrument, warn};

use super::dto::{BudgetRange, ClientRequest, ClientResponse};
use super::model::Client;
use crate::accounts::model::Account;
use crate::common::auditor::Auditor;
use crate::common::entity::Record;
use crate::common::repository::Filter;
use crate::common::service::{Creatable, EntityService, Readable};
use crate::error::AppError;

#[derive(Clone)]
pub struct ClientService {
    clients: EntityService<Client>,
    accounts: EntityService<Account>,
}

impl ClientService {
    pub fn new(clients: EntityService<Client>, accounts: EntityService<Account>) -> Self {
        Self { clients, accounts }
    }

    pub fn entities(&self) -> &EntityService<Client> {
        &self.clients
    }

    async fn check_request(&self, req: &ClientRequest, id: Option<i64>) -> Result<(), AppError> {
        req.check()?;
        if let Some(agent_id) = req.assigned_agent_id {
            self.accounts.get(agent_id).await?;
        }
        if let Some(other) = self.find_by_fiscal_id(req.fiscal_id.trim()).await? {
            if Some(other.id) != id {
                warn!(fiscal_id = %req.fiscal_id, "fiscal id already registered");
                return Err(AppError::Conflict(format!(
                    "Fiscal ID already exists: {}",
                    req.fiscal_id.trim()
                )));
            }
        }
        Ok(())
    }

    #[instrument(skip(self, req, by), fields(by = %by))]
    pub async fn create_client(
        &self,
        req: ClientRequest,
        by: &Auditor,
    ) -> Result<Record<Client>, AppError> {
        self.check_request(&req, None).await?;
        self.clients.create(req.into_client(), by).await
    }

    #[instrument(skip(self, req, by), fields(by = %by))]
    pub async fn update_client(
        &self,
        id: i64,
        req: ClientRequest,
        by: &Auditor,
    ) -> Result<Record<Client>, AppError> {
        self.clients.get(id).await?;
        self.check_request(&req, Some(id)).await?;
        let client = req.into_client();
        self.clients
            .modify(
                id,
                by,
                Box::new(move |c: &mut Client| {
                    *c = client;
                    Ok(())
                }),
            )
            .await
    }

    pub async fn find_by_agent(&self, agent_id: i64) -> Result<Vec<Record<Client>>, AppError> {
        self.clients
            .find_where(&Filter::new().eq("assigned_agent_id", agent_id))
            .await
    }

    pub async fn find_by_fiscal_id(
        &self,
        fiscal_id: &str,
    ) -> Result<Option<Record<Client>>, AppError> {
        let found = self
            .clients
            .find_where(&Filter::new().eq("fiscal_id", fiscal_id))
            .await?;
        Ok(found.into_iter().next())
    }

    pub async fn get_by_fiscal_id(&self, fiscal_id: &str) -> Result<Record<Client>, AppError> {
        self.find_by_fiscal_id(fiscal_id).await?.ok_or_else(|| {
            AppError::NotFound(format!("Client not found with fiscal id: {}", fiscal_id))
        })
    }

    /// Clients whose preferred budget overlaps `[min, max]`. Clients with
    /// either end of their budget unset never match.
    pub async fn find_by_budget_range(
        &self,
        range: &BudgetRange,
    ) -> Result<Vec<Record<Client>>, AppError> {
        if range.min > range.max {
            return Err(AppError::BadRequest(
                "min budget must not be greater than max budget".into(),
            ));
        }
        debug!(min = %range.min, max = %range.max, "find clients by budget");
        self.clients
            .find_where(
                &Filter::new()
                    .lte("preferred_budget_min", range.max)
                    .gte("preferred_budget_max", range.min),
            )
            .await
    }

    pub async fn to_response(&self, rec: Record<Client>) -> Result<ClientResponse, AppError> {
        let name = match rec.data.assigned_agent_id {
            Some(id) => self.accounts.find_by_id(id).await?.map(|a| a.data.name),
            None => None,
        };
        Ok(ClientResponse::new(rec, name))
    }

    pub async fn to_responses(
        &self,
        records: Vec<Record<Client>>,
    ) -> Result<Vec<ClientResponse>, AppError> {
        let mut agents: HashMap<i64, Option<String>> = HashMap::new();
        let mut out = Vec::with_capacity(records.len());
        for rec in records {
            let name = match rec.data.assigned_agent_id {
                Some(id) => {
                    if !agents.contains_key(&id) {
                        let name = self.accounts.find_by_id(id).await?.map(|a| a.data.name);
                        agents.insert(id, name);
                    }
                    agents.get(&id).cloned().flatten()
                }
                None => None,
            };
            out.push(ClientResponse::new(rec, name));
        }
        Ok(out)
    }
}
