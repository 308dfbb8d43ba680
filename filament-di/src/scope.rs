//! Instance lifecycle. A [Scope] is a lifetime policy which creates one [Repository] per
//! binding when the resolution index is built; the repository owns produced values and decides
//! whether to produce-and-store or return a cached one. Mixing scopes has consequences: a value
//! cached by a long-lived scope holds on to whatever was injected into it, even if that
//! dependency came from a shorter-lived scope. Direct injection of such pairs is rejected via
//! [Expiry] checking; deferred access through a provider is the sanctioned escape hatch.

use crate::error::ResolveError;
use crate::key::Dependency;
use crate::supplier::Value;
use crate::ty::Type;
use fxhash::FxHashMap;
#[cfg(test)]
use mockall::automock;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

/// Name of the application-wide singleton scope: one value per binding for the injector's
/// lifetime.
pub const APPLICATION: &str = "APPLICATION";

/// Name of the unscoped "always produce" scope: every resolution invokes production.
pub const INJECTION: &str = "INJECTION";

/// Name of the scope keying one value per exact resolved type descriptor seen at the call
/// site.
pub const DEPENDENCY_TYPE: &str = "DEPENDENCY_TYPE";

pub type ScopePtr = Box<dyn Scope + Send + Sync>;
pub type RepositoryPtr = Arc<dyn Repository>;

/// Scopes registered by name; bindings refer to scopes by these names.
pub type ScopeRegistry = FxHashMap<String, ScopePtr>;

/// The built-in scope registry: [APPLICATION], [INJECTION] and [DEPENDENCY_TYPE].
pub fn built_in_scopes() -> ScopeRegistry {
    [
        (
            APPLICATION.to_string(),
            Box::<ApplicationScope>::default() as ScopePtr,
        ),
        (
            INJECTION.to_string(),
            Box::<InjectionScope>::default() as ScopePtr,
        ),
        (
            DEPENDENCY_TYPE.to_string(),
            Box::<DependencyTypeScope>::default() as ScopePtr,
        ),
    ]
    .into_iter()
    .collect()
}

/// How often values owned by a scope become stale relative to other scopes. Injecting a value
/// which expires more often than its target is rejected unless the request defers access.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Expiry {
    /// Never participates in stability checks. Used by the unscoped repository, whose values
    /// are not retained anywhere.
    Ignore,
    /// Values never become stale.
    Never,
    /// Values become stale with the given frequency; higher expires more often.
    Expires(u8),
}

impl Expiry {
    pub fn expires_more_often_than(self, other: Expiry) -> bool {
        match (self, other) {
            (Expiry::Ignore, _) | (_, Expiry::Ignore) => false,
            (Expiry::Never, _) => false,
            (Expiry::Expires(own), Expiry::Never) => own > 0,
            (Expiry::Expires(own), Expiry::Expires(foreign)) => own > foreign,
        }
    }
}

/// A lifetime policy. `init` is invoked once per binding when the resolution index is built.
#[cfg_attr(test, automock)]
pub trait Scope {
    fn init(&self) -> RepositoryPtr;

    fn expiry(&self) -> Expiry;
}

/// Deferred production handed to [Repository::serve]; invoked at most once per cache miss.
pub trait Producer {
    fn produce(&self) -> Result<Value, ResolveError>;
}

/// Cache-key inputs for one `serve` call: the binding's ordinal within the finalized set, and
/// the resolved request (whose exact type descriptor dynamic scopes key on).
pub struct CacheSite<'a> {
    pub serial: usize,
    pub dependency: &'a Dependency,
}

/// A per-binding value cache. `serve` returns the cached value for the derived key without
/// touching the producer, or produces exactly once, stores and returns. Callers may pass
/// `None` as the producer when they know the value is cached; a miss without a producer is
/// [ResolveError::MissingProducer].
pub trait Repository: Send + Sync {
    fn serve(
        &self,
        site: &CacheSite<'_>,
        producer: Option<&dyn Producer>,
    ) -> Result<Value, ResolveError>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct Slot {
    guard: Mutex<()>,
    value: OnceLock<Value>,
}

/// Shared serve logic for caching repositories: double-checked per-key slots. The map lock is
/// held only to fetch or insert a slot, never across production, so re-entrant resolution of
/// other keys inside a producer cannot deadlock. Racing callers for one still-uncached key
/// serialize on the slot guard; the loser observes the winner's stored value.
struct KeyedCache<K> {
    slots: Mutex<FxHashMap<K, Arc<Slot>>>,
}

impl<K: Eq + Hash> KeyedCache<K> {
    fn new() -> Self {
        Self {
            slots: Mutex::new(FxHashMap::default()),
        }
    }

    fn serve(&self, key: K, producer: Option<&dyn Producer>) -> Result<Value, ResolveError> {
        let slot = lock(&self.slots).entry(key).or_default().clone();
        if let Some(value) = slot.value.get() {
            return Ok(value.clone());
        }
        let producer = producer.ok_or(ResolveError::MissingProducer)?;
        let _guard = lock(&slot.guard);
        if let Some(value) = slot.value.get() {
            return Ok(value.clone());
        }
        let value = producer.produce()?;
        let _ = slot.value.set(value.clone());
        Ok(value)
    }
}

/// Application-wide singleton scope: one value per binding.
#[derive(Default, Copy, Clone, Eq, PartialEq)]
pub struct ApplicationScope;

impl Scope for ApplicationScope {
    fn init(&self) -> RepositoryPtr {
        Arc::new(ApplicationRepository {
            cache: KeyedCache::new(),
        })
    }

    #[inline]
    fn expiry(&self) -> Expiry {
        Expiry::Never
    }
}

pub struct ApplicationRepository {
    cache: KeyedCache<usize>,
}

impl Repository for ApplicationRepository {
    fn serve(
        &self,
        site: &CacheSite<'_>,
        producer: Option<&dyn Producer>,
    ) -> Result<Value, ResolveError> {
        self.cache.serve(site.serial, producer)
    }
}

/// Unscoped "always produce" scope.
#[derive(Default, Copy, Clone, Eq, PartialEq)]
pub struct InjectionScope;

impl Scope for InjectionScope {
    fn init(&self) -> RepositoryPtr {
        Arc::new(InjectionRepository)
    }

    #[inline]
    fn expiry(&self) -> Expiry {
        Expiry::Ignore
    }
}

pub struct InjectionRepository;

impl Repository for InjectionRepository {
    fn serve(
        &self,
        _site: &CacheSite<'_>,
        producer: Option<&dyn Producer>,
    ) -> Result<Value, ResolveError> {
        producer.ok_or(ResolveError::MissingProducer)?.produce()
    }
}

/// Scope keying one value per exact resolved type descriptor. All calls share one binding, but
/// each distinct parameterization requested at the call site caches independently.
#[derive(Default, Copy, Clone, Eq, PartialEq)]
pub struct DependencyTypeScope;

impl Scope for DependencyTypeScope {
    fn init(&self) -> RepositoryPtr {
        Arc::new(DependencyTypeRepository {
            cache: KeyedCache::new(),
        })
    }

    #[inline]
    fn expiry(&self) -> Expiry {
        Expiry::Never
    }
}

pub struct DependencyTypeRepository {
    cache: KeyedCache<(usize, Type)>,
}

impl Repository for DependencyTypeRepository {
    fn serve(
        &self,
        site: &CacheSite<'_>,
        producer: Option<&dyn Producer>,
    ) -> Result<Value, ResolveError> {
        self.cache.serve(
            (site.serial, site.dependency.instance().ty.clone()),
            producer,
        )
    }
}
