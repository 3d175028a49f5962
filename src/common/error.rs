// src/common/error.rs

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::middleware::i18n::Locale;

// Falhas por registro. Nunca sobem até o cliente: o motor de agregação
// absorve e apenas contabiliza nos contadores de diagnóstico.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("Data não reconhecida: {0:?}")]
    UnparseableDate(String),

    #[error("Valor não reconhecido: {0:?}")]
    UnparseableAmount(String),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Fonte de receita desconhecida: {0}")]
    UnknownSource(String),

    // A fonte (banco ou API remota) falhou. O cache pode mascarar este erro
    // com uma entrada expirada.
    #[error("Fonte '{source_name}' indisponível: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    // Falha inesperada durante a agregação. Nunca é cacheada nem mascarada.
    #[error("Falha ao calcular a receita: {0}")]
    ComputeFailure(String),

    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),
}

impl AppError {
    pub fn source_unavailable(source_name: &str, reason: impl ToString) -> Self {
        AppError::SourceUnavailable {
            source_name: source_name.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Falhas que o cache pode substituir por dados expirados.
    pub fn is_source_failure(&self) -> bool {
        matches!(self, AppError::SourceUnavailable { .. })
    }

    /// Converte o erro interno na resposta HTTP, com mensagem no idioma do cliente.
    pub fn to_api_error(&self, locale: &Locale) -> ApiError {
        let thai = locale.is_thai();
        let pick = |th: &str, en: &str| if thai { th.to_string() } else { en.to_string() };

        match self {
            AppError::ValidationError(errors) => {
                let mut details = serde_json::Map::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<Value> = field_errors
                        .iter()
                        .map(|e| {
                            e.message
                                .as_ref()
                                .map(|m| m.to_string())
                                .unwrap_or_else(|| e.code.to_string())
                                .into()
                        })
                        .collect();
                    details.insert(field.to_string(), Value::Array(messages));
                }
                ApiError {
                    status: StatusCode::BAD_REQUEST,
                    error: pick("พารามิเตอร์ไม่ถูกต้อง", "One or more parameters are invalid."),
                    details: Some(Value::Object(details)),
                }
            }
            AppError::UnknownSource(name) => ApiError {
                status: StatusCode::NOT_FOUND,
                error: pick("ไม่พบแหล่งข้อมูลรายรับ", "Unknown revenue source."),
                details: Some(json!({ "source": name })),
            },
            AppError::SourceUnavailable { source_name, reason } => {
                tracing::error!("Fonte {} indisponível sem cache: {}", source_name, reason);
                ApiError {
                    status: StatusCode::SERVICE_UNAVAILABLE,
                    error: pick(
                        "ไม่สามารถโหลดข้อมูลได้ กรุณาตรวจสอบการเชื่อมต่อฐานข้อมูล",
                        "Revenue data is unavailable and no cached copy exists.",
                    ),
                    details: Some(json!({ "source": source_name, "message": reason })),
                }
            }
            // Todos os outros erros viram 500. O `tracing` registra o detalhe.
            e => {
                tracing::error!("Erro Interno do Servidor: {}", e);
                ApiError {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    error: pick("เกิดข้อผิดพลาดที่ไม่คาดคิด", "An unexpected error occurred."),
                    details: None,
                }
            }
        }
    }
}

// O erro que de fato vai para o cliente
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error: String,
    pub details: Option<Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "success": false,
            "error": self.error,
        });
        if let Some(details) = self.details {
            body["details"] = details;
        }
        (self.status, Json(body)).into_response()
    }
}
