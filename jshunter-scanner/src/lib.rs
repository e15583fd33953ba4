pub mod assets;
pub mod base_url;
pub mod endpoint;
pub mod error;
pub mod exposure;
pub mod extractor;
pub mod generator;
pub mod http;
pub mod page;
pub mod patterns;
pub mod result;
pub mod router;
pub mod session;
pub mod token;

pub use endpoint::EndpointCandidate;
pub use error::ScanError;
pub use exposure::EndpointScanner;
pub use extractor::{Extractor, ExtractorKind, ExtractorRegistry};
pub use generator::Generator;
pub use page::{PageController, PageHandle};
pub use result::ScanResult;
pub use router::RouterScanner;
pub use session::{ScanSession, ScanSettings};
