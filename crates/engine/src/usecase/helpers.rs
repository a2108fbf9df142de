//! ユースケース層の共通ヘルパー

use seisan_infra::InfraError;

use crate::error::EngineError;

/// リポジトリの `Result<Option<T>, InfraError>` を `Result<T, EngineError>` に変換する
///
/// `find_by_id` 等の `Option` を返すリポジトリメソッドの結果を、
/// `EngineError::NotFound` または `EngineError::Internal` に変換する。
pub(crate) trait FindResultExt<T> {
    /// `None` の場合は `EngineError::NotFound`、`InfraError` の場合は
    /// `EngineError::Internal` を返す
    fn or_not_found(self, entity_name: &str) -> Result<T, EngineError>;
}

impl<T> FindResultExt<T> for Result<Option<T>, InfraError> {
    fn or_not_found(self, entity_name: &str) -> Result<T, EngineError> {
        self.map_err(|e| EngineError::Internal(format!("{}の取得に失敗: {}", entity_name, e)))?
            .ok_or_else(|| EngineError::NotFound(format!("{}が見つかりません", entity_name)))
    }
}

/// 楽観的ロック失敗を `EngineError::Conflict` に変換する
///
/// 競合以外のインフラエラーはそのまま `Database` として伝播する。
pub(crate) fn map_version_conflict(e: InfraError) -> EngineError {
    if e.as_conflict().is_some() {
        EngineError::Conflict(
            "対象は既に更新されています。最新の情報を取得してください。".to_string(),
        )
    } else {
        e.into()
    }
}

#[cfg(test)]
mod tests {
    use seisan_infra::InfraError;

    use super::*;

    #[test]
    fn test_or_not_found_ok_some_は値を返す() {
        let result: Result<Option<i32>, InfraError> = Ok(Some(42));

        let value = result.or_not_found("テスト").unwrap();

        assert_eq!(value, 42);
    }

    #[test]
    fn test_or_not_found_ok_none_はnotfoundエラーを返す() {
        let result: Result<Option<i32>, InfraError> = Ok(None);

        let err = result.or_not_found("申請").unwrap_err();

        match err {
            EngineError::NotFound(msg) => {
                assert_eq!(msg, "申請が見つかりません");
            }
            other => panic!("NotFound を期待したが {:?} を受信", other),
        }
    }

    #[test]
    fn test_or_not_found_errはinternalエラーを返す() {
        let result: Result<Option<i32>, InfraError> = Err(InfraError::unexpected("接続失敗"));

        let err = result.or_not_found("承認チェーン").unwrap_err();

        match err {
            EngineError::Internal(msg) => {
                assert!(msg.contains("承認チェーンの取得に失敗"));
                assert!(msg.contains("接続失敗"));
            }
            other => panic!("Internal を期待したが {:?} を受信", other),
        }
    }
}
