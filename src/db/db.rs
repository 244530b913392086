// db/db.rs
use sqlx::{Pool, Postgres};

#[derive(Clone)]
pub struct DBClient {
    pub pool: Pool<Postgres>,
}

impl std::fmt::Debug for DBClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DBClient")
            .field("pool", &"Pool<Postgres>")
            .field("size", &self.pool.size())
            .finish()
    }
}

impl DBClient {
    pub fn new(pool: Pool<Postgres>) -> Self {
        DBClient { pool }
    }

    /// Page number (1-based) and page size into a LIMIT/OFFSET pair.
    pub fn limit_offset(page: u32, limit: u32) -> (i64, i64) {
        let limit = limit.clamp(1, 100) as i64;
        let page = page.max(1) as i64;
        (limit, (page - 1) * limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_offset() {
        assert_eq!(DBClient::limit_offset(1, 20), (20, 0));
        assert_eq!(DBClient::limit_offset(3, 10), (10, 20));
        assert_eq!(DBClient::limit_offset(0, 0), (1, 0));
        assert_eq!(DBClient::limit_offset(2, 500), (100, 100));
    }
}
