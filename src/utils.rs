//! Utility functions: instance generation, instance files, protocol transcripts and profiling

use crate::core::error::{LatticeError, Result};
use crate::core::lattice::Lattice;
use crate::core::matrix::Matrix;
use crate::core::types::LatticeVector;
use num_bigint::BigInt;

/// Seeded random integers, matrices and planted instances
pub mod generator {
    use super::*;
    use crate::utils::instance::Instance;
    use num_bigint::BigUint;
    use num_integer::Integer;
    use num_traits::One;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Uniform integer in `[0, 2^bits)`
    pub fn random_bits<R: Rng + ?Sized>(rng: &mut R, bits: u64) -> BigInt {
        let words = bits.div_ceil(32) as usize;
        let digits: Vec<u32> = (0..words).map(|_| rng.random()).collect();
        let mask = (BigUint::one() << bits) - 1u32;
        BigInt::from(BigUint::new(digits) & mask)
    }

    /// `rows x cols` matrix with entries uniform in `[0, 2^bits)`
    pub fn random_matrix<R: Rng + ?Sized>(rng: &mut R, rows: usize, cols: usize, bits: u64) -> Matrix {
        let data = (0..rows)
            .map(|_| (0..cols).map(|_| random_bits(rng, bits)).collect())
            .collect();
        Matrix::from_raw_parts(data, cols)
    }

    /// Random lattice basis with entries in `[-bound, bound]`
    pub fn random_lattice(n: usize, m: usize, bound: i64, seed: u64) -> Result<Lattice> {
        let mut rng = StdRng::seed_from_u64(seed);
        let data = (0..n)
            .map(|_| (0..m).map(|_| rng.random_range(-bound..=bound)).collect())
            .collect();
        Lattice::from_matrix(data)
    }

    /// Instance `A x = c (mod m)` with a planted solution.
    ///
    /// `A` has `rows x cols` entries below `2^coefficient_bits`, the planted
    /// `x` has entries below `2^solution_bits` and `c = A x mod m`.
    pub fn planted_instance(
        rows: usize,
        cols: usize,
        solution_bits: u64,
        coefficient_bits: u64,
        modulus: &BigInt,
        seed: u64,
    ) -> Result<Instance> {
        let mut rng = StdRng::seed_from_u64(seed);
        let solution: LatticeVector = (0..cols).map(|_| random_bits(&mut rng, solution_bits)).collect();
        let a = random_matrix(&mut rng, rows, cols, coefficient_bits);
        let target: LatticeVector = a
            .mul_vec(&solution)?
            .as_slice()
            .iter()
            .map(|v| v.mod_floor(modulus))
            .collect();

        log::debug!(
            "planted instance: {}x{}, solution below 2^{}, coefficients below 2^{}",
            rows,
            cols,
            solution_bits,
            coefficient_bits
        );
        Ok(Instance::new(a, Some(target), Some(modulus.clone())).with_solution(solution))
    }
}

/// JSON instance files with decimal-string integers
pub mod instance {
    use super::*;
    use crate::core::lattice::json_integer;
    use num_integer::Integer;
    use num_traits::Zero;
    use serde::{Deserialize, Serialize};
    use serde_json::Value;
    use std::path::Path;

    /// A system `A x = c (mod m)`, optionally with a known solution
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Instance {
        /// Coefficient matrix
        pub a: Matrix,
        /// Right-hand side; `None` means zero
        pub target: Option<LatticeVector>,
        /// Modulus; `None` means an exact integer system
        pub modulus: Option<BigInt>,
        /// Known solution, for generated instances
        pub solution: Option<LatticeVector>,
    }

    #[derive(Serialize, Deserialize)]
    struct InstanceFile {
        matrix: Vec<Vec<Value>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<Vec<Value>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        modulus: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        solution: Option<Vec<Value>>,
    }

    fn to_values(values: &[BigInt]) -> Vec<Value> {
        values.iter().map(|v| Value::String(v.to_string())).collect()
    }

    fn from_values(values: &[Value]) -> Result<LatticeVector> {
        values.iter().map(json_integer).collect::<Result<Vec<_>>>().map(LatticeVector::new)
    }

    impl Instance {
        /// New instance without a known solution
        pub fn new(a: Matrix, target: Option<LatticeVector>, modulus: Option<BigInt>) -> Self {
            Instance {
                a,
                target,
                modulus,
                solution: None,
            }
        }

        /// Attach a known solution
        pub fn with_solution(mut self, solution: LatticeVector) -> Self {
            self.solution = Some(solution);
            self
        }

        /// Whether `x` satisfies the system
        pub fn verify(&self, x: &LatticeVector) -> Result<bool> {
            let image = self.a.mul_vec(x)?;
            let zero = LatticeVector::zeros(self.a.rows());
            let target = self.target.as_ref().unwrap_or(&zero);
            if target.dimension() != image.dimension() {
                return Err(LatticeError::invalid_dimensions(
                    (image.dimension(), 1),
                    (target.dimension(), 1),
                ));
            }
            let difference = image.sub(target)?;
            Ok(match &self.modulus {
                Some(m) => difference.as_slice().iter().all(|v| v.mod_floor(m).is_zero()),
                None => difference.is_zero(),
            })
        }

        /// Serialize as JSON with every integer written as a decimal string
        pub fn to_json(&self) -> Result<String> {
            let file = InstanceFile {
                matrix: self.a.row_iter().map(to_values).collect(),
                target: self.target.as_ref().map(|t| to_values(t.as_slice())),
                modulus: self.modulus.as_ref().map(|m| Value::String(m.to_string())),
                solution: self.solution.as_ref().map(|s| to_values(s.as_slice())),
            };
            Ok(serde_json::to_string_pretty(&file)?)
        }

        /// Parse JSON; integers may be numbers or decimal strings
        pub fn from_json(input: &str) -> Result<Self> {
            let file: InstanceFile = serde_json::from_str(input)?;
            let rows = file
                .matrix
                .iter()
                .map(|row| from_values(row).map(LatticeVector::into_vec))
                .collect::<Result<Vec<_>>>()?;
            let cols = rows
                .first()
                .map(Vec::len)
                .ok_or_else(|| LatticeError::parse("instance matrix has no rows"))?;
            let a = Matrix::from_rows(rows, cols).map_err(|e| LatticeError::parse(e.to_string()))?;

            Ok(Instance {
                a,
                target: file.target.as_deref().map(from_values).transpose()?,
                modulus: file.modulus.as_ref().map(json_integer).transpose()?,
                solution: file.solution.as_deref().map(from_values).transpose()?,
            })
        }

        /// Write the JSON form to `path`
        pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
            std::fs::write(path, self.to_json()?)?;
            Ok(())
        }

        /// Read an instance from `path`
        pub fn load(path: impl AsRef<Path>) -> Result<Self> {
            let path = path.as_ref();
            let content = std::fs::read_to_string(path).map_err(|e| {
                LatticeError::io(format!("Failed to read instance file {}: {}", path.display(), e))
            })?;
            Self::from_json(&content)
        }
    }
}

/// Challenge-response transcripts of the inner-product authentication protocol.
///
/// The prover holds a key `k` of [`KEY_ENTRIES`] integers below `2^KEY_BITS`.
/// For a challenge `ch` it answers `sum(k_i * ch_i mod p)`. Every accepted
/// exchange is one linear congruence in the key, so enough of them pin the
/// key down as a small solution.
pub mod transcript {
    use super::*;
    use crate::solver::ModularSolver;
    use crate::utils::instance::Instance;
    use num_integer::Integer;
    use num_traits::Zero;

    /// Protocol modulus `p = 21652247421304131782679331804390761485569`, composite.
    ///
    /// Stored as its high and low 128-bit limbs.
    pub const PROTOCOL_MODULUS: (u128, u128) = (63, 214458305285008584486731536189364163841);
    /// Number of key entries
    pub const KEY_ENTRIES: usize = 40;
    /// Bit size of key and challenge entries
    pub const KEY_BITS: u64 = 128;

    /// [`PROTOCOL_MODULUS`] as an integer
    pub fn protocol_modulus() -> BigInt {
        let (high, low) = PROTOCOL_MODULUS;
        (BigInt::from(high) << 128u32) + BigInt::from(low)
    }

    /// The response an honest prover holding `key` sends for `challenge`
    pub fn expected_response(key: &[BigInt], challenge: &[BigInt], modulus: &BigInt) -> Result<BigInt> {
        if key.len() != challenge.len() {
            return Err(LatticeError::invalid_dimensions(
                (key.len(), 1),
                (challenge.len(), 1),
            ));
        }
        Ok(key
            .iter()
            .zip(challenge)
            .fold(BigInt::zero(), |acc, (k, ch)| acc + (k * ch).mod_floor(modulus)))
    }

    /// Decimal entries joined by single spaces, the form the key takes on the wire
    pub fn key_string(key: &LatticeVector) -> String {
        key.as_slice()
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Parse a challenge line: decimal entries separated by whitespace
    pub fn parse_challenge(line: &str) -> Result<Vec<BigInt>> {
        line.split_whitespace()
            .map(|tok| {
                tok.parse::<BigInt>()
                    .map_err(|e| LatticeError::parse(format!("invalid challenge entry '{}': {}", tok, e)))
            })
            .collect()
    }

    /// Observed (challenge, response) pairs
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Transcript {
        modulus: BigInt,
        challenges: Vec<Vec<BigInt>>,
        responses: Vec<BigInt>,
    }

    impl Default for Transcript {
        fn default() -> Self {
            Self::protocol()
        }
    }

    impl Transcript {
        /// Empty transcript for modulus `modulus`
        pub fn new(modulus: BigInt) -> Self {
            Transcript {
                modulus,
                challenges: Vec::new(),
                responses: Vec::new(),
            }
        }

        /// Empty transcript for [`PROTOCOL_MODULUS`]
        pub fn protocol() -> Self {
            Self::new(protocol_modulus())
        }

        /// Record an accepted exchange
        pub fn record(&mut self, challenge: Vec<BigInt>, response: BigInt) -> Result<()> {
            if let Some(first) = self.challenges.first() {
                if first.len() != challenge.len() {
                    return Err(LatticeError::invalid_dimensions(
                        (first.len(), 1),
                        (challenge.len(), 1),
                    ));
                }
            }
            self.challenges.push(challenge);
            self.responses.push(response);
            Ok(())
        }

        /// Number of recorded exchanges
        pub fn len(&self) -> usize {
            self.challenges.len()
        }

        /// Whether no exchange was recorded
        pub fn is_empty(&self) -> bool {
            self.challenges.is_empty()
        }

        /// Modulus of the protocol
        pub fn modulus(&self) -> &BigInt {
            &self.modulus
        }

        /// The system `A k = c (mod p)` the exchanges impose on the key
        pub fn to_system(&self) -> Result<(Matrix, LatticeVector)> {
            let cols = self
                .challenges
                .first()
                .map(Vec::len)
                .ok_or_else(|| LatticeError::degenerate("transcript has no exchanges"))?;
            let a = Matrix::from_rows(self.challenges.clone(), cols)?;
            let c = self.responses.iter().map(|r| r.mod_floor(&self.modulus)).collect();
            Ok((a, c))
        }

        /// The system as an instance
        pub fn to_instance(&self) -> Result<Instance> {
            let (a, c) = self.to_system()?;
            Ok(Instance::new(a, Some(c), Some(self.modulus.clone())))
        }

        /// Recover the key as the small solution of the system
        pub fn recover_key(&self, solver: &ModularSolver) -> Result<LatticeVector> {
            let (a, c) = self.to_system()?;
            log::info!(
                "recovering a {}-entry key from {} exchanges",
                a.cols(),
                a.rows()
            );
            solver.small_lgs2(&a, Some(&c), &self.modulus)
        }
    }
}

/// Performance profiling utilities
pub mod profiling {
    use std::time::Instant;

    /// Run `func` and log how long it took
    pub fn profile_function<F, R>(name: &str, func: F) -> R
    where
        F: FnOnce() -> R,
    {
        let start = Instant::now();
        let result = func();
        let duration = start.elapsed();

        log::debug!("Function '{}' took {:.2?}", name, duration);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::generator::*;
    use super::instance::Instance;
    use super::transcript::*;
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_random_bits_range() {
        let mut rng = StdRng::seed_from_u64(1);
        let bound = BigInt::from(1u32) << 80u32;
        for _ in 0..100 {
            let v = random_bits(&mut rng, 80);
            assert!(v >= BigInt::from(0) && v < bound);
        }
        assert_eq!(random_bits(&mut rng, 0), BigInt::from(0));

        let mut a = StdRng::seed_from_u64(9);
        let mut b = StdRng::seed_from_u64(9);
        assert_eq!(random_bits(&mut a, 128), random_bits(&mut b, 128));
    }

    #[test]
    fn test_planted_instance_verifies() {
        let modulus = protocol_modulus();
        let instance = planted_instance(3, 4, 64, 128, &modulus, 17).unwrap();
        let solution = instance.solution.clone().unwrap();
        assert_eq!(instance.a.dimension(), (3, 4));
        assert!(instance.verify(&solution).unwrap());
        assert!(!instance.verify(&LatticeVector::zeros(4)).unwrap());
    }

    #[test]
    fn test_instance_json_round_trip() {
        let instance = planted_instance(2, 3, 16, 40, &BigInt::from(1_000_003), 2).unwrap();
        let json = instance.to_json().unwrap();
        assert!(json.contains("\"modulus\": \"1000003\""));
        assert_eq!(Instance::from_json(&json).unwrap(), instance);
    }

    #[test]
    fn test_instance_accepts_numbers() {
        let instance = Instance::from_json(r#"{"matrix": [[1, "2"], [3, 4]], "modulus": 7}"#).unwrap();
        assert_eq!(instance.a, Matrix::from_i64(vec![vec![1, 2], vec![3, 4]]).unwrap());
        assert_eq!(instance.modulus, Some(BigInt::from(7)));
        assert!(instance.target.is_none());

        assert!(Instance::from_json(r#"{"matrix": []}"#).is_err());
        assert!(Instance::from_json(r#"{"matrix": [["x"]]}"#).is_err());
    }

    #[test]
    fn test_protocol_constants() {
        let modulus = protocol_modulus();
        assert_eq!(modulus.to_string(), "21652247421304131782679331804390761485569");
        assert_eq!(modulus.bits(), 134);
        assert_eq!(Transcript::protocol().modulus(), &modulus);
    }

    #[test]
    fn test_expected_response_and_key_string() {
        let key: Vec<BigInt> = vec![BigInt::from(3), BigInt::from(5)];
        let challenge: Vec<BigInt> = vec![BigInt::from(4), BigInt::from(6)];
        // (12 mod 7) + (30 mod 7) = 5 + 2
        assert_eq!(expected_response(&key, &challenge, &BigInt::from(7)).unwrap(), BigInt::from(7));
        assert!(expected_response(&key, &challenge[..1], &BigInt::from(7)).is_err());

        let key = LatticeVector::from_integer_vec(vec![12, 0, 345]);
        assert_eq!(key_string(&key), "12 0 345");
        assert_eq!(parse_challenge(" 12  0 345\n").unwrap(), key.into_vec());
        assert!(parse_challenge("1 two").is_err());
    }

    #[test]
    fn test_transcript_system() {
        let mut transcript = Transcript::new(BigInt::from(11));
        assert!(transcript.to_system().is_err());
        transcript.record(vec![BigInt::from(1), BigInt::from(2)], BigInt::from(25)).unwrap();
        transcript.record(vec![BigInt::from(3), BigInt::from(4)], BigInt::from(5)).unwrap();
        assert!(transcript.record(vec![BigInt::from(1)], BigInt::from(0)).is_err());

        let (a, c) = transcript.to_system().unwrap();
        assert_eq!(a.dimension(), (2, 2));
        assert_eq!(c, LatticeVector::from_integer_vec(vec![3, 5]));
        assert_eq!(transcript.len(), 2);
    }

    #[test]
    fn test_random_lattice_seeded() {
        let a = random_lattice(4, 5, 100, 42).unwrap();
        let b = random_lattice(4, 5, 100, 42).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.dimension(), (4, 5));
    }
}
