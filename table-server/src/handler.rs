//! Request layer
//!
//! One method per service operation. Every call checks the caller's identity,
//! runs the operation and answers with an [`ApiResponse`]. This is the only
//! place where [`ServiceError`](crate::service::ServiceError) becomes an
//! [`AppError`].

use crate::auth::IdentityProvider;
use crate::service::TableService;
use chrono::NaiveDate;
use shared::error::{ApiResponse, AppError};
use shared::models::{
    DailyStats, MonthSummary, MonthlyStats, Round, Table, TableRounds, TableStatus,
    TableStatusEntry, Ticket,
};
use shared::request::{
    CheckoutRequest, CreateTableRequest, MonthQuery, MoveTableRequest, OpenRoundRequest,
    SelectivePaymentRequest, UpdateLineItemsRequest,
};
use std::future::Future;

/// Who may run an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    /// Any authenticated staff member
    Staff,
    /// Registry mutations and every accounting operation
    Admin,
}

#[derive(Debug, Clone)]
pub struct Handler {
    service: TableService,
}

impl Handler {
    pub fn new(service: TableService) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &TableService {
        &self.service
    }

    /// Gate, run and translate
    async fn call<T, E>(
        &self,
        caller: &dyn IdentityProvider,
        access: Access,
        operation: &'static str,
        fut: impl Future<Output = Result<T, E>>,
    ) -> ApiResponse<T>
    where
        E: Into<AppError>,
    {
        let identity = caller.caller_identity();
        let gate = match access {
            Access::Staff => identity.require_authenticated(),
            Access::Admin => identity.require_admin(),
        };
        if let Err(e) = gate {
            tracing::warn!(operation, role = ?identity.role, code = %e.code, "Request rejected");
            return e.into();
        }

        match fut.await {
            Ok(data) => ApiResponse::success(data),
            Err(e) => {
                let err: AppError = e.into();
                if err.http_status().is_server_error() {
                    tracing::error!(operation, code = %err.code, error = %err.message, "Request failed");
                } else {
                    tracing::debug!(operation, code = %err.code, error = %err.message, "Request refused");
                }
                err.into()
            }
        }
    }

    // ========== Tables ==========

    pub async fn list_tables(&self, caller: &dyn IdentityProvider) -> ApiResponse<Vec<Table>> {
        self.call(caller, Access::Staff, "list_tables", async {
            self.service.list_tables()
        })
        .await
    }

    pub async fn get_table(&self, caller: &dyn IdentityProvider, number: u32) -> ApiResponse<Table> {
        self.call(caller, Access::Staff, "get_table", async {
            self.service.get_table(number)
        })
        .await
    }

    pub async fn create_table(
        &self,
        caller: &dyn IdentityProvider,
        req: CreateTableRequest,
    ) -> ApiResponse<Table> {
        self.call(caller, Access::Admin, "create_table", async {
            self.service.create_custom_table(&req.name, req.placement).await
        })
        .await
    }

    pub async fn delete_table(&self, caller: &dyn IdentityProvider, number: u32) -> ApiResponse<()> {
        self.call(caller, Access::Admin, "delete_table", async {
            self.service.delete_custom_table(number).await
        })
        .await
    }

    pub async fn table_status(
        &self,
        caller: &dyn IdentityProvider,
        number: u32,
    ) -> ApiResponse<TableStatus> {
        self.call(caller, Access::Staff, "table_status", async {
            self.service.table_status(number)
        })
        .await
    }

    pub async fn table_statuses(
        &self,
        caller: &dyn IdentityProvider,
    ) -> ApiResponse<Vec<TableStatusEntry>> {
        self.call(caller, Access::Staff, "table_statuses", async {
            self.service.table_statuses()
        })
        .await
    }

    pub async fn move_table(
        &self,
        caller: &dyn IdentityProvider,
        req: MoveTableRequest,
    ) -> ApiResponse<()> {
        self.call(caller, Access::Staff, "move_table", async {
            self.service
                .move_table(req.from_table_number, req.to_table_number)
                .await
        })
        .await
    }

    // ========== Rounds ==========

    pub async fn open_round(
        &self,
        caller: &dyn IdentityProvider,
        req: OpenRoundRequest,
    ) -> ApiResponse<Round> {
        self.call(caller, Access::Staff, "open_round", async {
            self.service.open_round(req.table_number, req.line_items).await
        })
        .await
    }

    pub async fn append_line_items(
        &self,
        caller: &dyn IdentityProvider,
        req: UpdateLineItemsRequest,
    ) -> ApiResponse<Round> {
        self.call(caller, Access::Staff, "append_line_items", async {
            self.service.append_line_items(&req.round_id, req.line_items).await
        })
        .await
    }

    pub async fn replace_line_items(
        &self,
        caller: &dyn IdentityProvider,
        req: UpdateLineItemsRequest,
    ) -> ApiResponse<Round> {
        self.call(caller, Access::Staff, "replace_line_items", async {
            self.service.replace_line_items(&req.round_id, req.line_items).await
        })
        .await
    }

    pub async fn confirm_service(
        &self,
        caller: &dyn IdentityProvider,
        table_number: u32,
    ) -> ApiResponse<()> {
        self.call(caller, Access::Staff, "confirm_service", async {
            self.service.confirm_service(table_number).await
        })
        .await
    }

    pub async fn mark_paid(&self, caller: &dyn IdentityProvider, round_id: &str) -> ApiResponse<Round> {
        self.call(caller, Access::Staff, "mark_paid", async {
            self.service.mark_paid(round_id).await
        })
        .await
    }

    pub async fn mark_all_paid(
        &self,
        caller: &dyn IdentityProvider,
        table_number: u32,
    ) -> ApiResponse<usize> {
        self.call(caller, Access::Staff, "mark_all_paid", async {
            self.service.mark_all_paid_for_table(table_number).await
        })
        .await
    }

    pub async fn clean_table(
        &self,
        caller: &dyn IdentityProvider,
        table_number: u32,
    ) -> ApiResponse<usize> {
        self.call(caller, Access::Staff, "clean_table", async {
            self.service.delete_open_rounds_for_table(table_number).await
        })
        .await
    }

    pub async fn table_rounds(
        &self,
        caller: &dyn IdentityProvider,
        table_number: u32,
    ) -> ApiResponse<TableRounds> {
        self.call(caller, Access::Staff, "table_rounds", async {
            self.service.table_rounds(table_number)
        })
        .await
    }

    pub async fn get_round(&self, caller: &dyn IdentityProvider, round_id: &str) -> ApiResponse<Round> {
        self.call(caller, Access::Staff, "get_round", async {
            self.service.get_round(round_id)
        })
        .await
    }

    pub async fn paid_rounds(
        &self,
        caller: &dyn IdentityProvider,
        table_number: u32,
    ) -> ApiResponse<Vec<Round>> {
        self.call(caller, Access::Staff, "paid_rounds", async {
            self.service.paid_rounds_for_table(table_number)
        })
        .await
    }

    // ========== Checkout ==========

    pub async fn checkout(
        &self,
        caller: &dyn IdentityProvider,
        req: CheckoutRequest,
    ) -> ApiResponse<Ticket> {
        self.call(caller, Access::Staff, "checkout", async {
            self.service
                .pay_and_issue_ticket(req.table_number, &req.round_ids, req.payment_method)
                .await
        })
        .await
    }

    pub async fn pay_selected(
        &self,
        caller: &dyn IdentityProvider,
        req: SelectivePaymentRequest,
    ) -> ApiResponse<Ticket> {
        self.call(caller, Access::Staff, "pay_selected", async {
            self.service
                .pay_selected_items(req.table_number, &req.items, req.payment_method)
                .await
        })
        .await
    }

    pub async fn get_ticket(&self, caller: &dyn IdentityProvider, ticket_id: &str) -> ApiResponse<Ticket> {
        self.call(caller, Access::Staff, "get_ticket", async {
            self.service.get_ticket(ticket_id)
        })
        .await
    }

    pub async fn get_ticket_by_number(
        &self,
        caller: &dyn IdentityProvider,
        ticket_number: &str,
    ) -> ApiResponse<Ticket> {
        self.call(caller, Access::Staff, "get_ticket_by_number", async {
            self.service.get_ticket_by_number(ticket_number)
        })
        .await
    }

    pub async fn daily_tickets(
        &self,
        caller: &dyn IdentityProvider,
        date: NaiveDate,
    ) -> ApiResponse<Vec<Ticket>> {
        self.call(caller, Access::Staff, "daily_tickets", async {
            self.service.daily_tickets(date)
        })
        .await
    }

    pub async fn tickets_for_table(
        &self,
        caller: &dyn IdentityProvider,
        table_number: u32,
    ) -> ApiResponse<Vec<Ticket>> {
        self.call(caller, Access::Staff, "tickets_for_table", async {
            self.service.tickets_for_table(table_number)
        })
        .await
    }

    // ========== Accounting ==========

    pub async fn daily_stats(
        &self,
        caller: &dyn IdentityProvider,
        date: NaiveDate,
    ) -> ApiResponse<DailyStats> {
        self.call(caller, Access::Admin, "daily_stats", async {
            self.service.daily_stats(date)
        })
        .await
    }

    pub async fn reset_daily_stats(
        &self,
        caller: &dyn IdentityProvider,
        date: NaiveDate,
    ) -> ApiResponse<usize> {
        self.call(caller, Access::Admin, "reset_daily_stats", async {
            self.service.reset_daily_stats(date)
        })
        .await
    }

    pub async fn monthly_stats(
        &self,
        caller: &dyn IdentityProvider,
        query: MonthQuery,
    ) -> ApiResponse<MonthlyStats> {
        self.call(caller, Access::Admin, "monthly_stats", async {
            self.service.monthly_stats(query.year, query.month)
        })
        .await
    }

    pub async fn previous_months(
        &self,
        caller: &dyn IdentityProvider,
        count: u32,
    ) -> ApiResponse<Vec<MonthSummary>> {
        self.call(caller, Access::Admin, "previous_months", async {
            self.service.previous_months(count)
        })
        .await
    }
}
