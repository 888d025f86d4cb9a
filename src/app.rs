use crate::config::Config;
use crate::error::AppResult;
use crate::infrastructure::{self, RecordStore};
use crate::server::{self, AppState};
use crate::services::{AiServices, LibraryService, StudyRepository};
use crate::utils::logging::log_startup;
use crate::workflow::GenerationFlow;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// 应用主结构
pub struct App {
    config: Config,
    router: Router,
}

impl App {
    /// 初始化应用：按配置创建存储和 AI 后端
    pub async fn initialize(config: Config) -> AppResult<Self> {
        log_startup(&config);

        let store = infrastructure::build_store(&config);
        let ai = AiServices::from_config(&config);
        Self::with_components(config, store, ai)
    }

    /// 用给定的存储和 AI 能力组装应用
    pub fn with_components(config: Config, store: Arc<dyn RecordStore>, ai: AiServices) -> AppResult<Self> {
        let state = build_state(&config, store, ai)?;
        let router = server::router(state, config.max_upload_bytes);
        Ok(Self { config, router })
    }

    /// 路由（测试中直接发请求）
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// 绑定地址并开始服务
    pub async fn run(self) -> AppResult<()> {
        let listener = TcpListener::bind(self.config.bind_address.as_str()).await?;

        info!("✓ 开始监听 http://{}", self.config.bind_address);

        axum::serve(listener, self.router).await?;
        Ok(())
    }
}

fn build_state(config: &Config, store: Arc<dyn RecordStore>, ai: AiServices) -> AppResult<AppState> {
    let repository = StudyRepository::new(store, config)?;
    Ok(AppState {
        library: LibraryService::new(repository.clone()),
        flow: GenerationFlow::new(ai, repository, config),
    })
}
