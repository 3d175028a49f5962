// src/services/ttl_cache.rs

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::Instant;
use utoipa::ToSchema;

use crate::common::error::AppError;

pub const DEFAULT_TTL: Duration = Duration::from_secs(30);
pub const DEFAULT_GRACE: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum CacheStatus {
    Hit,
    Miss,
    Stale,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
            CacheStatus::Stale => "STALE",
        }
    }
}

/// O que o cache devolve: o valor e de onde ele veio.
#[derive(Debug, Clone)]
pub struct Cached<V> {
    pub value: V,
    pub status: CacheStatus,
    pub computed_at: DateTime<Utc>,
}

impl<V> Cached<V> {
    pub fn is_stale(&self) -> bool {
        self.status == CacheStatus::Stale
    }
}

// Entradas nunca são alteradas: um refresh cria outra e substitui no mapa.
#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    computed_at: DateTime<Utc>,
    expires_at: Instant,
}

impl<V: Clone> CacheEntry<V> {
    fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }

    fn to_cached(&self, status: CacheStatus) -> Cached<V> {
        Cached {
            value: self.value.clone(),
            status,
            computed_at: self.computed_at,
        }
    }
}

// Falha de um refresh em forma clonável, para repassar a quem estava esperando
#[derive(Debug, Clone)]
enum FlightFailure {
    Source { source_name: String, reason: String },
    Compute(String),
}

impl From<&AppError> for FlightFailure {
    fn from(err: &AppError) -> Self {
        match err {
            AppError::SourceUnavailable { source_name, reason } => FlightFailure::Source {
                source_name: source_name.clone(),
                reason: reason.clone(),
            },
            other => FlightFailure::Compute(other.to_string()),
        }
    }
}

impl From<FlightFailure> for AppError {
    fn from(failure: FlightFailure) -> Self {
        match failure {
            FlightFailure::Source { source_name, reason } => AppError::SourceUnavailable { source_name, reason },
            FlightFailure::Compute(reason) => AppError::ComputeFailure(reason),
        }
    }
}

// `None` enquanto o refresh não terminou
type FlightOutcome<V> = Option<Result<Cached<V>, FlightFailure>>;

struct CacheInner<V> {
    entries: RwLock<HashMap<String, Arc<CacheEntry<V>>>>,
    // Um refresh por chave de cada vez; os demais recebem o resultado dele
    in_flight: Mutex<HashMap<String, watch::Receiver<FlightOutcome<V>>>>,
    ttl: Duration,
    grace: Duration,
}

// Tira a chave de `in_flight` quando o refresh termina, inclusive em pânico
struct FlightGuard<'a, V> {
    inner: &'a CacheInner<V>,
    key: &'a str,
}

impl<V> Drop for FlightGuard<'_, V> {
    fn drop(&mut self) {
        self.inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(self.key);
    }
}

/// Cache em memória com TTL e fallback para dados expirados.
///
/// Local ao processo: cada instância do serviço tem o seu.
pub struct TtlCache<V> {
    inner: Arc<CacheInner<V>>,
}

impl<V> Clone for TtlCache<V> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<V> TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: Duration, grace: Duration) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                entries: RwLock::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
                ttl,
                grace,
            }),
        }
    }

    /// Entrada fresca: devolve direto. Expirada ou ausente: recalcula.
    /// Se a fonte falhar e existir uma entrada antiga, ela volta marcada como `Stale`;
    /// sem entrada nenhuma, o erro sobe como veio.
    pub async fn get_or_refresh<F, Fut>(&self, key: &str, compute: F) -> Result<Cached<V>, AppError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, AppError>> + Send + 'static,
    {
        if let Some(entry) = self.inner.lookup(key) {
            if entry.is_fresh(Instant::now()) {
                tracing::debug!("✅ Cache HIT: {}", key);
                return Ok(entry.to_cached(CacheStatus::Hit));
            }
        }

        // O refresh roda numa task separada: se o cliente desistir da
        // requisição, o cálculo termina e alimenta o cache mesmo assim.
        let inner = Arc::clone(&self.inner);
        let owned_key = key.to_string();
        let refresh = tokio::spawn(async move { inner.refresh(owned_key, compute).await });

        let outcome = match refresh.await {
            Ok(outcome) => outcome,
            Err(join_err) => Err(AppError::ComputeFailure(join_err.to_string())),
        };

        match outcome {
            Ok(cached) => Ok(cached),
            Err(err) if err.is_source_failure() => match self.inner.lookup(key) {
                Some(stale) => {
                    tracing::warn!("⚠️ Usando cache expirado para {} após falha: {}", key, err);
                    Ok(stale.to_cached(CacheStatus::Stale))
                }
                None => Err(err),
            },
            Err(err) => Err(err),
        }
    }

    /// Remove tudo. Usado quando os dados de origem mudam.
    pub fn clear(&self) -> usize {
        let mut entries = self.inner.write_entries();
        let removed = entries.len();
        entries.clear();
        removed
    }

    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut entries = self.inner.write_entries();
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        before - entries.len()
    }
}

impl<V> CacheInner<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn read_entries(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<CacheEntry<V>>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_entries(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<CacheEntry<V>>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lookup(&self, key: &str) -> Option<Arc<CacheEntry<V>>> {
        self.read_entries().get(key).cloned()
    }

    async fn refresh<F, Fut>(&self, key: String, compute: F) -> Result<Cached<V>, AppError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, AppError>>,
    {
        let leader = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(receiver) = in_flight.get(&key).cloned() {
                Err(receiver)
            } else {
                let (sender, receiver) = watch::channel(None);
                in_flight.insert(key.clone(), receiver);
                Ok(sender)
            }
        };

        let sender = match leader {
            Ok(sender) => sender,
            Err(receiver) => return Self::wait_for_leader(&key, receiver).await,
        };
        let _guard = FlightGuard { inner: self, key: &key };

        // Outra requisição pode ter atualizado a chave logo antes
        let outcome = match self.lookup(&key).filter(|entry| entry.is_fresh(Instant::now())) {
            Some(entry) => Ok(entry.to_cached(CacheStatus::Hit)),
            None => {
                tracing::debug!("📡 Cache MISS, recalculando: {}", key);
                compute()
                    .await
                    .map(|value| self.store(key.clone(), value).to_cached(CacheStatus::Miss))
            }
        };

        let shared = match &outcome {
            Ok(cached) => Ok(cached.clone()),
            Err(err) => Err(FlightFailure::from(err)),
        };
        sender.send_replace(Some(shared));
        outcome
    }

    // Quem chega com um refresh em andamento não chama a fonte de novo:
    // espera o resultado do líder, sucesso ou falha.
    async fn wait_for_leader(
        key: &str,
        mut receiver: watch::Receiver<FlightOutcome<V>>,
    ) -> Result<Cached<V>, AppError> {
        tracing::debug!("⏳ Aguardando refresh em andamento: {}", key);
        let outcome = receiver.wait_for(Option::is_some).await.map(|o| (*o).clone());

        match outcome {
            Ok(Some(Ok(cached))) => Ok(Cached { status: CacheStatus::Hit, ..cached }),
            Ok(Some(Err(failure))) => Err(failure.into()),
            // O líder morreu sem publicar nada (pânico)
            Ok(None) | Err(_) => Err(AppError::ComputeFailure(format!("refresh de {} interrompido", key))),
        }
    }

    fn store(&self, key: String, value: V) -> Arc<CacheEntry<V>> {
        let now = Instant::now();
        let entry = Arc::new(CacheEntry {
            value,
            computed_at: Utc::now(),
            expires_at: now + self.ttl,
        });

        let mut entries = self.write_entries();
        // Limpeza oportunista a cada escrita. Entradas com leitor ativo ficam.
        let grace = self.grace;
        let before = entries.len();
        entries.retain(|_, e| now <= e.expires_at + grace || Arc::strong_count(e) > 1);
        let purged = before - entries.len();
        if purged > 0 {
            tracing::debug!("🧹 {} entradas antigas removidas do cache", purged);
        }
        entries.insert(key, Arc::clone(&entry));

        entry
    }
}
