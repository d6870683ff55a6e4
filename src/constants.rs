pub const HEADER_JSON: &str = "application/json";

pub const DEFAULT_REALM: &str = "origin";
pub const DEFAULT_API_GROUP: &str = "image.openshift.io";
pub const DEFAULT_BIND: &str = "127.0.0.1:5080";
pub const DEFAULT_CLUSTER_HOST: &str = "https://kubernetes.default.svc";
pub const DEFAULT_CLUSTER_TIMEOUT_MS: u64 = 5_000;

// Token handed out to anonymous callers by the registry's token endpoint.
pub const ANONYMOUS_TOKEN: &str = "anonymous";

pub const RESOURCE_REPOSITORY: &str = "repository";
pub const RESOURCE_ADMIN: &str = "admin";

pub const ACTION_PUSH: &str = "push";
pub const ACTION_PULL: &str = "pull";
pub const ACTION_WILDCARD: &str = "*";
pub const ACTION_PRUNE: &str = "prune";

pub const LAYERS_RESOURCE: &str = "imagestreams/layers";
pub const IMAGES_RESOURCE: &str = "images";
pub const DELETE_VERB: &str = "delete";

pub const AUTHORIZATION_API_VERSION: &str = "authorization.openshift.io/v1";
