// Wire models for the HTTP API
// Field names follow the public JSON contract; Rust names follow the ledger.

use chrono::{DateTime, Utc};
use ledger_core::{Receipt, Statement, Transaction, TransactionRequest};
use serde::{Deserialize, Serialize};

/// POST /clientes/:id/transacoes body
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionBody {
    #[serde(rename = "valor")]
    pub amount: i64,
    #[serde(rename = "tipo")]
    pub kind: String,
    #[serde(rename = "descricao")]
    pub description: String,
}

impl From<TransactionBody> for TransactionRequest {
    fn from(body: TransactionBody) -> Self {
        TransactionRequest::new(body.kind, body.amount, body.description)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionResponse {
    #[serde(rename = "limite")]
    pub limit: i64,
    #[serde(rename = "saldo")]
    pub balance: i64,
}

impl From<Receipt> for TransactionResponse {
    fn from(receipt: Receipt) -> Self {
        Self {
            limit: receipt.limit,
            balance: receipt.balance,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceView {
    pub total: i64,
    #[serde(rename = "data_extrato")]
    pub generated_at: DateTime<Utc>,
    #[serde(rename = "limite")]
    pub limit: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionView {
    #[serde(rename = "tipo")]
    pub kind: String,
    #[serde(rename = "valor")]
    pub amount: i64,
    #[serde(rename = "descricao")]
    pub description: String,
    #[serde(rename = "realizada_em")]
    pub occurred_at: DateTime<Utc>,
}

impl From<Transaction> for TransactionView {
    fn from(tx: Transaction) -> Self {
        Self {
            kind: tx.kind.code().to_string(),
            amount: tx.amount,
            description: tx.description,
            occurred_at: tx.occurred_at,
        }
    }
}

/// GET /clientes/:id/extrato response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementResponse {
    #[serde(rename = "saldo")]
    pub balance: BalanceView,
    #[serde(rename = "ultimas_transacoes")]
    pub last_transactions: Vec<TransactionView>,
}

impl From<Statement> for StatementResponse {
    fn from(statement: Statement) -> Self {
        Self {
            balance: BalanceView {
                total: statement.balance,
                generated_at: statement.generated_at,
                limit: statement.limit,
            },
            last_transactions: statement
                .last_transactions
                .into_iter()
                .map(TransactionView::from)
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: String,
    pub version: &'static str,
    pub accounts: usize,
}
