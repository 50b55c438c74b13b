pub mod amount;
pub mod block;
pub mod transaction;
pub mod validator;

pub use amount::{decode_amount, encode_amount, parse_amount, AMOUNT_SCALE};
pub use block::{Block, EnergyGenesis, GenesisConfig};
pub use transaction::{Call, Transaction};
pub use validator::ValidatorUpdate;
