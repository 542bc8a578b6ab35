use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_mysql::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::settings::Settings;
use anyhow::anyhow;
use chrono::{Duration, Utc};
use sqlx::{MySql, Pool};
use std::sync::Arc;

pub struct Server {
    pub token_service: Arc<dyn TokenService>,
    pub login_service: Arc<dyn LoginService>,
    pub principal_repo: Arc<dyn PrincipalRepo>,
    pub rate_gate: Arc<dyn RateGate>,
    pool: Option<Pool<MySql>>,
}

impl Server {
    /// Assemble a server from pre-wired services. `try_new` builds these
    /// from settings; embedders and tests inject their own.
    pub fn from_parts(
        token_service: Arc<dyn TokenService>,
        login_service: Arc<dyn LoginService>,
        principal_repo: Arc<dyn PrincipalRepo>,
        rate_gate: Arc<dyn RateGate>,
    ) -> Self {
        Self {
            token_service,
            login_service,
            principal_repo,
            rate_gate,
            pool: None,
        }
    }

    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let policy = TokenPolicy {
            access_ttl: Duration::minutes(settings.jwt.access_ttl_minutes),
            refresh_ttl: Duration::days(settings.jwt.refresh_ttl_days),
            refresh_min_interval: Duration::seconds(settings.jwt.refresh_min_interval_secs),
            rotate_refresh_id: settings.jwt.rotate_refresh_id,
        };
        // The shared secret lives inside the signer from here on; nothing
        // else holds it.
        let signer = TokenSigner::new(settings.jwt.secret.as_bytes());
        let credential_hasher: Arc<dyn CredentialHasher> = Arc::new(Argon2PasswordHasher);

        let principal_repo: Arc<dyn PrincipalRepo>;
        let family_repo: Arc<dyn TokenFamilyRepo>;
        let revocation_list: Arc<dyn RevocationList>;
        let tx_manager: Arc<dyn TxManager>;
        let pool: Option<Pool<MySql>>;

        match settings.auth.backend.as_str() {
            "real" => {
                let mysql = settings
                    .mysql
                    .as_ref()
                    .ok_or_else(|| anyhow!("mysql settings required for the real backend"))?;
                let redis_cfg = settings
                    .redis
                    .as_ref()
                    .ok_or_else(|| anyhow!("redis settings required for the real backend"))?;

                let mysql_pool = Pool::<MySql>::connect(&mysql.dsn).await?;
                let redis_client = redis::Client::open(redis_cfg.dsn.as_str())?;
                let redis_manager = redis_client.get_connection_manager().await?;

                principal_repo = Arc::new(MySqlPrincipalRepo::new(mysql_pool.clone()));
                family_repo = Arc::new(MySqlTokenFamilyRepo);
                revocation_list = Arc::new(RedisRevocationList::new(
                    redis_manager,
                    redis_cfg.revocation_prefix.clone(),
                ));
                tx_manager = Arc::new(MySqlTxManager::new(mysql_pool.clone()));
                pool = Some(mysql_pool);
            }
            "memory" => {
                let memory_principals = Arc::new(MemoryPrincipalRepo::new());
                if let Some(demo) = &settings.demo_principal {
                    let password_hash = credential_hasher
                        .hash_password(&demo.password)
                        .await
                        .map_err(|e| anyhow!(e.to_string()))?;
                    memory_principals.insert(PrincipalRecord {
                        user_id: UserId(uuid::Uuid::new_v4()),
                        subject: demo.subject.clone(),
                        provider: Provider::Local,
                        password_hash,
                        email_verified: true,
                        created_at: Utc::now(),
                    });
                    info!(subject = %demo.subject, "seeded demo principal");
                }
                principal_repo = memory_principals;
                family_repo = Arc::new(MemoryTokenFamilyRepo::new());
                revocation_list = Arc::new(MemoryRevocationList::new());
                tx_manager = Arc::new(MemoryTxManager::new());
                pool = None;
            }
            other => return Err(anyhow!("Unknown auth backend: {}", other)),
        }

        let token_service: Arc<dyn TokenService> = Arc::new(JwtTokenService::new(
            signer,
            family_repo,
            principal_repo.clone(),
            revocation_list,
            tx_manager,
            policy,
        ));

        let login_service: Arc<dyn LoginService> = Arc::new(RealLoginService::new(
            principal_repo.clone(),
            credential_hasher,
            token_service.clone(),
        ));

        let rate_gate: Arc<dyn RateGate> = if settings.rate_limit.enabled {
            Arc::new(FixedWindowRateGate::new(
                settings.rate_limit.max_requests,
                (settings.rate_limit.window_secs * 1000) as i64,
            ))
        } else {
            Arc::new(OpenGate)
        };

        info!(backend = %settings.auth.backend, "server started");

        let mut server = Self::from_parts(token_service, login_service, principal_repo, rate_gate);
        server.pool = pool;
        Ok(server)
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");

        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}
