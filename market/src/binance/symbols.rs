use std::collections::HashMap;

const DEFAULT_SYMBOLS: &[(&str, &str)] = &[
    ("bitcoin", "BTCUSDT"),
    ("ethereum", "ETHUSDT"),
    ("binancecoin", "BNBUSDT"),
    ("solana", "SOLUSDT"),
    ("ripple", "XRPUSDT"),
    ("cardano", "ADAUSDT"),
    ("dogecoin", "DOGEUSDT"),
    ("tron", "TRXUSDT"),
    ("polkadot", "DOTUSDT"),
    ("avalanche-2", "AVAXUSDT"),
    ("chainlink", "LINKUSDT"),
    ("litecoin", "LTCUSDT"),
    ("shiba-inu", "SHIBUSDT"),
    ("uniswap", "UNIUSDT"),
    ("stellar", "XLMUSDT"),
    ("cosmos", "ATOMUSDT"),
    ("near", "NEARUSDT"),
    ("aptos", "APTUSDT"),
    ("arbitrum", "ARBUSDT"),
    ("pepe", "PEPEUSDT"),
];

/// Maps application coin ids to exchange trading symbols. Coins without an
/// entry cannot be streamed.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    symbols: HashMap<String, String>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::from_pairs(DEFAULT_SYMBOLS.iter().copied())
    }
}

impl SymbolTable {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let symbols = pairs
            .into_iter()
            .map(|(id, symbol)| {
                (
                    id.as_ref().trim().to_lowercase(),
                    symbol.as_ref().trim().to_uppercase(),
                )
            })
            .filter(|(id, symbol)| !id.is_empty() && !symbol.is_empty())
            .collect();
        Self { symbols }
    }

    pub fn symbol_for(&self, coin_id: &str) -> Option<&str> {
        self.symbols
            .get(&coin_id.trim().to_lowercase())
            .map(String::as_str)
    }

    pub fn is_supported(&self, coin_id: &str) -> bool {
        self.symbol_for(coin_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}
