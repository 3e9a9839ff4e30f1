/*
 * Responsibility
 * - HTTP に依存しない pipeline の中核 (検証・認可・レート制限・identity 伝播・転送)
 * - middleware からはここの関数/型だけを呼ぶ
 */
pub mod auth;
pub mod identity;
pub mod rate_limit;
pub mod upstream;
