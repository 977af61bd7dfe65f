/// Multiplier of the polynomial rolling hash. Arithmetic wraps mod 2^64.
const BASE: u64 = 257;

/// Incremental Rabin-Karp search over a growing buffer.
///
/// Each call to [`scan`](Self::scan) examines only the bytes appended since
/// the previous call. The haystack passed on successive calls must be the
/// same buffer, grown at the end; bytes already examined must not change.
#[derive(Debug, Clone)]
pub struct PatternScanner {
    pattern: Vec<u8>,
    pattern_hash: u64,
    window_hash: u64,
    /// BASE^(len - 1), the weight of the leftmost byte in a window.
    high_power: u64,
    scanned: usize,
}

impl PatternScanner {
    pub fn new(pattern: &[u8]) -> Self {
        let pattern_hash = pattern
            .iter()
            .fold(0u64, |h, &b| h.wrapping_mul(BASE).wrapping_add(b as u64));
        let high_power = (1..pattern.len()).fold(1u64, |p, _| p.wrapping_mul(BASE));

        Self {
            pattern: pattern.to_vec(),
            pattern_hash,
            window_hash: 0,
            high_power,
            scanned: 0,
        }
    }

    /// Number of haystack bytes examined so far.
    pub fn scanned(&self) -> usize {
        self.scanned
    }

    /// Returns the offset of the first occurrence of the pattern, scanning
    /// only bytes not seen before.
    pub fn scan(&mut self, haystack: &[u8]) -> Option<usize> {
        let n = self.pattern.len();
        if n == 0 {
            return Some(0);
        }

        while self.scanned < haystack.len() {
            let i = self.scanned;
            if i >= n {
                let outgoing = (haystack[i - n] as u64).wrapping_mul(self.high_power);
                self.window_hash = self.window_hash.wrapping_sub(outgoing);
            }
            self.window_hash = self
                .window_hash
                .wrapping_mul(BASE)
                .wrapping_add(haystack[i] as u64);
            self.scanned += 1;

            if self.scanned >= n && self.window_hash == self.pattern_hash {
                let start = self.scanned - n;
                if haystack[start..self.scanned] == self.pattern[..] {
                    return Some(start);
                }
            }
        }

        None
    }
}
