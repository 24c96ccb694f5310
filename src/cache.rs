/// 参照データのキャッシュ
///
/// ステータス、優先度、課題タイプなどサーバー側でほとんど変化しないデータを
/// クライアントのインスタンス単位で保持する。
/// 1. 初回アクセス時に読み込み (read-through)
/// 2. バージョン/コンポーネントの作成・削除時にプロジェクト単位で破棄
/// 3. 期限切れはない
///
/// 同時に初回アクセスした場合は両方が取得し、先に書き込んだ方が残る。
use crate::error::Result;
use crate::models::{
    CustomField, IssueLinkType, JiraEntity, ProjectComponent, ProjectVersion, RemoteIssueType,
    RemotePriority, RemoteResolution, RemoteStatus,
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;

/// id と名前で引ける辞書
#[derive(Debug, Clone)]
pub struct EntityDictionary<T> {
    items: Vec<T>,
    by_id: HashMap<String, usize>,
    by_name: HashMap<String, usize>,
}

impl<T: JiraEntity> EntityDictionary<T> {
    /// 同じ id が複数ある場合は最初のものを残す
    pub fn new(entities: Vec<T>) -> Self {
        let mut items = Vec::with_capacity(entities.len());
        let mut by_id = HashMap::new();
        let mut by_name = HashMap::new();

        for entity in entities {
            if by_id.contains_key(entity.id()) {
                continue;
            }
            let index = items.len();
            by_id.insert(entity.id().to_string(), index);
            by_name
                .entry(entity.name().to_lowercase())
                .or_insert(index);
            items.push(entity);
        }

        Self {
            items,
            by_id,
            by_name,
        }
    }

    pub fn get_by_id(&self, id: &str) -> Option<&T> {
        self.by_id.get(id).map(|&index| &self.items[index])
    }

    /// 大文字小文字を区別しない
    pub fn get_by_name(&self, name: &str) -> Option<&T> {
        self.by_name
            .get(&name.to_lowercase())
            .map(|&index| &self.items[index])
    }

    pub fn values(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// 1種類の参照データ
#[derive(Debug)]
pub struct EntityCache<T> {
    inner: RwLock<Option<Arc<EntityDictionary<T>>>>,
}

impl<T: JiraEntity> Default for EntityCache<T> {
    fn default() -> Self {
        Self {
            inner: RwLock::new(None),
        }
    }
}

impl<T: JiraEntity> EntityCache<T> {
    pub async fn get(&self) -> Option<Arc<EntityDictionary<T>>> {
        self.inner.read().await.clone()
    }

    /// 既に値がある場合はそれを返し、渡された一覧は捨てる
    pub async fn populate(&self, entities: Vec<T>) -> Arc<EntityDictionary<T>> {
        let mut guard = self.inner.write().await;
        match guard.as_ref() {
            Some(existing) => existing.clone(),
            None => {
                let dictionary = Arc::new(EntityDictionary::new(entities));
                *guard = Some(dictionary.clone());
                dictionary
            }
        }
    }

    pub async fn get_or_populate<F, Fut>(&self, fetch: F) -> Result<Arc<EntityDictionary<T>>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<T>>>,
    {
        if let Some(existing) = self.get().await {
            return Ok(existing);
        }
        let entities = fetch().await?;
        tracing::debug!(count = entities.len(), "populating reference cache");
        Ok(self.populate(entities).await)
    }

    pub async fn invalidate(&self) {
        *self.inner.write().await = None;
    }
}

/// プロジェクトキーなどで区切られた参照データ
#[derive(Debug)]
pub struct KeyedEntityCache<T> {
    inner: RwLock<HashMap<String, Arc<EntityDictionary<T>>>>,
}

impl<T: JiraEntity> Default for KeyedEntityCache<T> {
    fn default() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<T: JiraEntity> KeyedEntityCache<T> {
    pub async fn get(&self, key: &str) -> Option<Arc<EntityDictionary<T>>> {
        self.inner.read().await.get(key).cloned()
    }

    pub async fn populate(&self, key: &str, entities: Vec<T>) -> Arc<EntityDictionary<T>> {
        let mut guard = self.inner.write().await;
        guard
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(EntityDictionary::new(entities)))
            .clone()
    }

    pub async fn get_or_populate<F, Fut>(
        &self,
        key: &str,
        fetch: F,
    ) -> Result<Arc<EntityDictionary<T>>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<T>>>,
    {
        if let Some(existing) = self.get(key).await {
            return Ok(existing);
        }
        let entities = fetch().await?;
        tracing::debug!(key, count = entities.len(), "populating keyed reference cache");
        Ok(self.populate(key, entities).await)
    }

    pub async fn invalidate(&self, key: &str) {
        self.inner.write().await.remove(key);
    }

    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }
}

/// クライアントごとの参照データキャッシュ
#[derive(Debug, Default)]
pub struct JiraCache {
    pub statuses: EntityCache<RemoteStatus>,
    pub priorities: EntityCache<RemotePriority>,
    pub resolutions: EntityCache<RemoteResolution>,
    pub issue_types: EntityCache<RemoteIssueType>,
    pub link_types: EntityCache<IssueLinkType>,
    pub custom_fields: EntityCache<CustomField>,
    /// プロジェクトキー -> 課題タイプ
    pub project_issue_types: KeyedEntityCache<RemoteIssueType>,
    /// `CustomFieldFetchOptions::cache_key` -> カスタムフィールド
    pub scoped_custom_fields: KeyedEntityCache<CustomField>,
    /// プロジェクトキー -> バージョン
    pub versions: KeyedEntityCache<ProjectVersion>,
    /// プロジェクトキー -> コンポーネント
    pub components: KeyedEntityCache<ProjectComponent>,
}

impl JiraCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn status(id: &str, name: &str) -> RemoteStatus {
        RemoteStatus {
            id: id.to_string(),
            name: name.to_string(),
            self_url: None,
            description: None,
            icon_url: None,
            status_category: None,
        }
    }

    #[test]
    fn test_dictionary_lookup() {
        // Given: 同じ id と同じ名前を含む一覧
        let dictionary = EntityDictionary::new(vec![
            status("1", "Open"),
            status("1", "Duplicate"),
            status("2", "open"),
            status("3", "Closed"),
        ]);

        // Then: id の重複は捨てられ、名前は最初に一致したものが返る
        assert_eq!(dictionary.len(), 3);
        assert_eq!(dictionary.get_by_id("2").unwrap().name, "open");
        assert_eq!(dictionary.get_by_name("OPEN").unwrap().id, "1");
        assert!(dictionary.get_by_name("Duplicate").is_none());
        assert!(dictionary.get_by_id("99").is_none());
    }

    #[tokio::test]
    async fn test_entity_cache_fetches_once() {
        // Given: 空のキャッシュと呼び出し回数のカウンタ
        let cache: EntityCache<RemoteStatus> = EntityCache::default();
        let calls = AtomicUsize::new(0);

        // When: 2回読み出す
        for _ in 0..2 {
            let dictionary = cache
                .get_or_populate(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(vec![status("1", "Open")])
                })
                .await
                .unwrap();
            assert_eq!(dictionary.len(), 1);
        }

        // Then: 取得は1回だけ
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_entity_cache_populate_keeps_first_writer() {
        let cache: EntityCache<RemoteStatus> = EntityCache::default();

        cache.populate(vec![status("1", "Open")]).await;
        let second = cache.populate(vec![status("2", "Closed")]).await;

        assert_eq!(second.values()[0].name, "Open");
    }

    #[tokio::test]
    async fn test_keyed_cache_invalidate() {
        // Given: 2つのプロジェクトのバージョンがキャッシュされている
        let cache: KeyedEntityCache<RemoteStatus> = KeyedEntityCache::default();
        cache.populate("A", vec![status("1", "Open")]).await;
        cache.populate("B", vec![status("2", "Closed")]).await;

        // When: A だけ破棄する
        cache.invalidate("A").await;

        // Then: B は残る
        assert!(cache.get("A").await.is_none());
        assert!(cache.get("B").await.is_some());
    }

    #[tokio::test]
    async fn test_fetch_error_does_not_populate() {
        let cache: EntityCache<RemoteStatus> = EntityCache::default();

        let result = cache
            .get_or_populate(|| async {
                Err(crate::error::Error::NotFound("status".to_string()))
            })
            .await;

        assert!(result.is_err());
        assert!(cache.get().await.is_none());
    }
}
