use serde::Serialize;
use sqlx::SqlitePool;

pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 100;

/// One row of the leaderboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    pub name: String,
    pub wins: i64,
    pub played: i64,
}

#[derive(Clone)]
pub struct LeaderboardRepository {
    pool: SqlitePool,
}

impl LeaderboardRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Best players by wins, then fewest games played, then name.
    pub async fn top(&self, limit: u32) -> Result<Vec<LeaderboardEntry>, sqlx::Error> {
        let limit = limit.clamp(1, MAX_LIMIT);
        let rows: Vec<(String, i64, i64)> = sqlx::query_as(
            "SELECT name, SUM(won) AS wins, COUNT(*) AS played FROM (
                 SELECT winner AS name, 1 AS won FROM match_results
                 UNION ALL
                 SELECT loser AS name, 0 AS won FROM match_results
             )
             GROUP BY name
             ORDER BY wins DESC, played ASC, name ASC
             LIMIT $1",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(name, wins, played)| LeaderboardEntry { name, wins, played })
            .collect())
    }

    pub async fn record_match(&self, winner: &str, loser: &str, mode: &str) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO match_results (winner, loser, mode) VALUES ($1, $2, $3)")
            .bind(winner)
            .bind(loser)
            .bind(mode)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
