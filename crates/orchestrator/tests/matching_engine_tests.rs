//! Candidate filtering, scoring, caching and jobs against a real SQLite database.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use matchmaker_config::DatabaseConfig;
use matchmaker_database::{
    initialize_database, Gender, MatchingJobStatus, NewUser, ProfileDraft, ProfileRepository, User, UserRepository,
    UserRole, UserStatus,
};
use matchmaker_orchestrator::{
    CompletionProvider, JobRunner, MatchingEngine, NoProgress, OrchestratorError, OrchestratorResult,
    ALGORITHM_VERSION,
};
use sqlx::SqlitePool;
use tempfile::TempDir;

type TestResult<T = ()> = anyhow::Result<T>;

/// Returns a canned answer and remembers the prompts it saw.
#[derive(Default)]
struct ScriptedProvider {
    answer: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    fn answering(answer: &str) -> Self {
        Self {
            answer: Some(answer.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn generate_json(&self, prompt: &str) -> OrchestratorResult<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.answer.clone().ok_or_else(|| OrchestratorError::ProviderStatus {
            status: 503,
            body: "unavailable".to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

struct TestContext {
    pool: SqlitePool,
    _temp_dir: TempDir,
}

impl TestContext {
    async fn new() -> TestResult<Self> {
        let temp_dir = TempDir::new()?;
        let config = DatabaseConfig {
            url: format!("sqlite://{}", temp_dir.path().join("orchestrator.db").display()),
            max_connections: 1,
        };
        Ok(Self {
            pool: initialize_database(&config).await?,
            _temp_dir: temp_dir,
        })
    }

    async fn person(
        &self,
        email: &str,
        first_name: &str,
        gender: Gender,
        birth_date: &str,
        religious_level: &str,
    ) -> TestResult<User> {
        let mut new_user = NewUser::candidate(email, first_name, "Levi");
        new_user.status = UserStatus::Active;
        let mut conn = self.pool.acquire().await?;
        let user = UserRepository::create(&mut conn, &new_user).await?;
        drop(conn);
        let draft = ProfileDraft {
            gender: Some(gender),
            birth_date: Some(birth_date.to_string()),
            religious_level: Some(religious_level.to_string()),
            about: Some(format!("{first_name} loves hiking")),
            ..ProfileDraft::default()
        };
        ProfileRepository::new(self.pool.clone()).create(user.id, &draft).await?;
        Ok(user)
    }

    async fn matchmaker(&self) -> TestResult<User> {
        let mut new_user = NewUser::candidate("mm@example.com", "Rivka", "Cohen");
        new_user.role = UserRole::Matchmaker;
        new_user.status = UserStatus::Active;
        let mut conn = self.pool.acquire().await?;
        Ok(UserRepository::create(&mut conn, &new_user).await?)
    }

    /// Avi plus one compatible candidate and three that the filters must drop.
    async fn scenario(&self) -> TestResult<(User, User)> {
        let avi = self.person("avi@example.com", "Avi", Gender::Male, "1995-04-10", "DATI_LEUMI").await?;
        let noa = self.person("noa@example.com", "Noa", Gender::Female, "1997-01-01", "DATI_LEUMI_LITE").await?;
        self.person("tamar@example.com", "Tamar", Gender::Female, "1996-05-05", "HAREDI_STRICT").await?;
        self.person("dana@example.com", "Dana", Gender::Female, "1975-05-05", "DATI_LEUMI").await?;
        self.person("dan@example.com", "Dan", Gender::Male, "1996-05-05", "DATI_LEUMI").await?;
        Ok((avi, noa))
    }
}

const ANSWER: &str = r#"```json
{"matches": [{"candidateIndex": 1, "score": 88, "reasoning": "shared values"}, {"candidateIndex": 4, "score": 90, "reasoning": "?"}]}
```"#;

#[tokio::test]
async fn scan_filters_scores_and_caches() -> TestResult {
    let ctx = TestContext::new().await?;
    let matchmaker = ctx.matchmaker().await?;
    let (avi, noa) = ctx.scenario().await?;
    let provider = Arc::new(ScriptedProvider::answering(ANSWER));
    let engine = MatchingEngine::new(ctx.pool.clone(), provider.clone(), 15);

    let search = engine.find_matches(avi.id, matchmaker.id, false, &NoProgress).await?;
    assert!(!search.from_cache);
    assert_eq!(search.meta.total_candidates_scanned, 1);
    assert_eq!(search.matches.len(), 1);
    assert_eq!(search.matches[0].user_id, noa.id);
    assert_eq!(search.matches[0].score, 88);

    let prompts = provider.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("About: Noa loves hiking"));
    assert!(!prompts[0].contains("Tamar"));
    assert!(!prompts[0].contains("Dana"));

    let cached = engine.find_matches(avi.id, matchmaker.id, false, &NoProgress).await?;
    assert!(cached.from_cache);
    assert!(!cached.meta.is_stale);
    assert_eq!(cached.meta.algorithm_version, ALGORITHM_VERSION);
    assert_eq!(cached.matches, search.matches);
    assert_eq!(provider.prompts().len(), 1);

    engine.find_matches(avi.id, matchmaker.id, true, &NoProgress).await?;
    assert_eq!(provider.prompts().len(), 2);

    assert!(engine.delete_saved(avi.id).await?);
    assert!(engine.load_saved(avi.id).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn stale_cache_triggers_a_new_scan() -> TestResult {
    let ctx = TestContext::new().await?;
    let matchmaker = ctx.matchmaker().await?;
    let (avi, _) = ctx.scenario().await?;
    let provider = Arc::new(ScriptedProvider::answering(ANSWER));
    let engine = MatchingEngine::new(ctx.pool.clone(), provider.clone(), 15);

    engine.find_matches(avi.id, matchmaker.id, false, &NoProgress).await?;
    sqlx::query("UPDATE saved_match_searches SET updated_at = '2020-01-01T00:00:00.000Z'")
        .execute(&ctx.pool)
        .await?;

    let saved = engine.load_saved(avi.id).await?.expect("saved");
    assert!(saved.meta.is_stale);

    let fresh = engine.find_matches(avi.id, matchmaker.id, false, &NoProgress).await?;
    assert!(!fresh.from_cache);
    assert_eq!(provider.prompts().len(), 2);
    Ok(())
}

#[tokio::test]
async fn no_candidates_skips_the_model() -> TestResult {
    let ctx = TestContext::new().await?;
    let matchmaker = ctx.matchmaker().await?;
    let avi = ctx.person("avi@example.com", "Avi", Gender::Male, "1995-04-10", "HAREDI").await?;
    let provider = Arc::new(ScriptedProvider::default());
    let engine = MatchingEngine::new(ctx.pool.clone(), provider.clone(), 15);

    let search = engine.find_matches(avi.id, matchmaker.id, false, &NoProgress).await?;
    assert!(search.matches.is_empty());
    assert!(provider.prompts().is_empty());

    let err = engine.find_matches(matchmaker.id, matchmaker.id, true, &NoProgress).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::TargetNotFound(_)));
    Ok(())
}

#[tokio::test]
async fn jobs_complete_with_results() -> TestResult {
    let ctx = TestContext::new().await?;
    let matchmaker = ctx.matchmaker().await?;
    let (avi, _) = ctx.scenario().await?;
    let engine = MatchingEngine::new(ctx.pool.clone(), Arc::new(ScriptedProvider::answering(ANSWER)), 15);
    let runner = JobRunner::new(ctx.pool.clone(), Arc::new(engine));

    let job = runner.create_job(avi.id, matchmaker.id, None).await?;
    assert_eq!(job.status, MatchingJobStatus::Pending);
    assert_eq!(job.method, "algorithmic");

    runner.process(&job.public_id).await?;
    let done = runner.status(&job.public_id).await?;
    assert_eq!(done.status, MatchingJobStatus::Completed);
    assert_eq!(done.progress, 100);
    assert_eq!(done.matches_found, Some(1));
    assert_eq!(done.total_candidates, Some(1));
    let result: serde_json::Value = serde_json::from_str(done.result.as_deref().expect("result"))?;
    assert_eq!(result["matches"][0]["score"], 88);
    assert_eq!(result["fromCache"], false);

    // Completed jobs are not picked up again.
    runner.process(&job.public_id).await?;
    runner.process("missing").await?;
    assert!(matches!(
        runner.status("missing").await.unwrap_err(),
        OrchestratorError::JobNotFound(_)
    ));
    Ok(())
}

#[tokio::test]
async fn spawned_job_records_provider_failure() -> TestResult {
    let ctx = TestContext::new().await?;
    let matchmaker = ctx.matchmaker().await?;
    let (avi, _) = ctx.scenario().await?;
    let engine = MatchingEngine::new(ctx.pool.clone(), Arc::new(ScriptedProvider::default()), 15);
    let runner = JobRunner::new(ctx.pool.clone(), Arc::new(engine));

    let job = runner.create_job(avi.id, matchmaker.id, Some("algorithmic")).await?;
    runner.spawn(job.public_id.clone()).await?;

    let failed = runner.status(&job.public_id).await?;
    assert_eq!(failed.status, MatchingJobStatus::Failed);
    assert!(failed.error.as_deref().unwrap_or_default().contains("503"));
    assert!(failed.progress < 100);
    Ok(())
}

#[tokio::test]
async fn job_is_failed_when_its_result_cannot_be_stored() -> TestResult {
    let ctx = TestContext::new().await?;
    let matchmaker = ctx.matchmaker().await?;
    let (avi, _) = ctx.scenario().await?;
    let engine = MatchingEngine::new(ctx.pool.clone(), Arc::new(ScriptedProvider::answering(ANSWER)), 15);
    let runner = JobRunner::new(ctx.pool.clone(), Arc::new(engine));
    let job = runner.create_job(avi.id, matchmaker.id, None).await?;

    sqlx::query(
        "CREATE TRIGGER refuse_completion BEFORE UPDATE ON matching_jobs \
         WHEN NEW.status = 'completed' BEGIN SELECT RAISE(ABORT, 'result store refused'); END",
    )
    .execute(&ctx.pool)
    .await?;

    let err = runner.process(&job.public_id).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::Database(_)));

    let failed = runner.status(&job.public_id).await?;
    assert_eq!(failed.status, MatchingJobStatus::Failed);
    assert!(failed.error.as_deref().unwrap_or_default().contains("result store refused"));
    Ok(())
}
