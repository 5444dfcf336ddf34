//! Keyed permutations expressed as rank-1 constraint systems.
//!
//! A [`Scheme`] evaluates `v = F(plain, key)` and exposes the same computation as a set of
//! wires and [`Constraint`]s `<a, z> * <b, z> = <c, z>` over the wire assignment `z`.
//! Wire [`PLAIN_WIRE`] carries the plaintext, wire [`KEY_WIRE`] carries the key and the last
//! wire carries the output.

use pod_cryptography::{Element, Scalar, G1};

/// Wire carrying the public plaintext.
pub const PLAIN_WIRE: usize = 0;

/// Wire carrying the secret key.
pub const KEY_WIRE: usize = 1;

/// A linear combination of wires plus a constant.
#[derive(Clone, Debug)]
pub struct LinearCombination {
    pub terms: Vec<(usize, Scalar)>,
    pub constant: Scalar,
}

impl LinearCombination {
    /// Creates a linear combination from a single wire with coefficient 1.
    pub fn wire(wire: usize) -> Self {
        Self {
            terms: vec![(wire, Scalar::one())],
            constant: Scalar::zero(),
        }
    }

    /// Adds `coeff * wire`.
    pub fn with(mut self, wire: usize, coeff: Scalar) -> Self {
        self.terms.push((wire, coeff));
        self
    }

    /// Adds a constant.
    pub fn plus(mut self, constant: &Scalar) -> Self {
        self.constant.add(constant);
        self
    }

    /// Evaluates the combination over a single wire assignment.
    pub fn evaluate(&self, assignment: &[Scalar]) -> Scalar {
        let mut sum = self.constant;
        for (wire, coeff) in &self.terms {
            let mut term = assignment[*wire];
            term.mul(coeff);
            sum.add(&term);
        }
        sum
    }

    /// Evaluates the combination position-wise over wire rows (`rows[wire][t]`).
    pub fn evaluate_rows(&self, rows: &[Vec<Scalar>], length: usize) -> Vec<Scalar> {
        let mut out = vec![self.constant; length];
        for (wire, coeff) in &self.terms {
            for (acc, value) in out.iter_mut().zip(&rows[*wire]) {
                let mut term = *value;
                term.mul(coeff);
                acc.add(&term);
            }
        }
        out
    }

    /// Returns the commitment to the combination's rows given per-wire commitments and the
    /// commitment to the all-ones vector.
    pub fn commitment(&self, var_coms: &[G1], ones: &G1) -> G1 {
        let mut points = Vec::with_capacity(self.terms.len() + 1);
        let mut scalars = Vec::with_capacity(self.terms.len() + 1);
        for (wire, coeff) in &self.terms {
            points.push(var_coms[*wire]);
            scalars.push(*coeff);
        }
        points.push(*ones);
        scalars.push(self.constant);
        G1::msm(&points, &scalars)
    }

    /// Returns the blinding of [`Self::commitment`] given per-wire blindings.
    pub fn blinding(&self, var_coms_r: &[Scalar]) -> Scalar {
        // The constant is committed without blinding.
        let mut zeroed = self.clone();
        zeroed.constant = Scalar::zero();
        zeroed.evaluate(var_coms_r)
    }
}

/// A rank-1 constraint `a * b = c`.
#[derive(Clone, Debug)]
pub struct Constraint {
    pub a: LinearCombination,
    pub b: LinearCombination,
    pub c: LinearCombination,
}

impl Constraint {
    /// Returns whether the assignment satisfies the constraint.
    pub fn is_satisfied(&self, assignment: &[Scalar]) -> bool {
        let mut left = self.a.evaluate(assignment);
        left.mul(&self.b.evaluate(assignment));
        left == self.c.evaluate(assignment)
    }
}

/// A keyed permutation and its constraint system.
pub trait Scheme: Send + Sync + 'static {
    /// Name recorded in cache files (caches of different schemes never mix).
    fn name(&self) -> &'static str;

    /// Number of wires.
    fn wires(&self) -> usize;

    /// Constraints over the wires.
    fn constraints(&self) -> &[Constraint];

    /// Computes `F(plain, key)`.
    fn generate(&self, plain: &Scalar, key: &Scalar) -> Scalar;

    /// Computes the full wire assignment of `F(plain, key)` (the last wire holds the output).
    fn assign(&self, plain: &Scalar, key: &Scalar) -> Vec<Scalar>;
}

/// Number of MiMC rounds.
pub const MIMC5_ROUNDS: usize = 40;

const DST_MIMC5: &[u8] = b"POD_MIMC5_ROUND_CONSTANT";

/// MiMC with exponent 5: `x_{i+1} = (x_i + key + c_i)^5`, output `x_40 + key`.
///
/// Wires are laid out as `[plain, key, x2[40], x4[40], x5[40]]`, where round `i` computes
/// `x1 = x5[i-1] + key + c_i` (with `x5[-1] = plain`), `x2 = x1^2`, `x4 = x2^2` and
/// `x5 = x4 * x1`. The final round folds the output key addition into its constraint.
#[derive(Clone, Debug)]
pub struct Mimc5 {
    constants: Vec<Scalar>,
    constraints: Vec<Constraint>,
}

impl Default for Mimc5 {
    fn default() -> Self {
        Self::new()
    }
}

impl Mimc5 {
    pub fn new() -> Self {
        let constants: Vec<Scalar> = (0..MIMC5_ROUNDS)
            .map(|i| Scalar::map(DST_MIMC5, format!("mimc_5_const{i}").as_bytes()))
            .collect();

        let x2 = |i: usize| 2 + i;
        let x4 = |i: usize| 2 + MIMC5_ROUNDS + i;
        let x5 = |i: usize| 2 + 2 * MIMC5_ROUNDS + i;
        let mut constraints = Vec::with_capacity(3 * MIMC5_ROUNDS);
        for (i, constant) in constants.iter().enumerate() {
            let data = if i == 0 { PLAIN_WIRE } else { x5(i - 1) };
            let x1 = LinearCombination::wire(data)
                .with(KEY_WIRE, Scalar::one())
                .plus(constant);
            constraints.push(Constraint {
                a: x1.clone(),
                b: x1.clone(),
                c: LinearCombination::wire(x2(i)),
            });
            constraints.push(Constraint {
                a: LinearCombination::wire(x2(i)),
                b: LinearCombination::wire(x2(i)),
                c: LinearCombination::wire(x4(i)),
            });
            let mut output = LinearCombination::wire(x5(i));
            if i == MIMC5_ROUNDS - 1 {
                output = output.with(KEY_WIRE, Scalar::one().neg());
            }
            constraints.push(Constraint {
                a: LinearCombination::wire(x4(i)),
                b: x1,
                c: output,
            });
        }
        Self {
            constants,
            constraints,
        }
    }
}

impl Scheme for Mimc5 {
    fn name(&self) -> &'static str {
        "mimc5"
    }

    fn wires(&self) -> usize {
        2 + 3 * MIMC5_ROUNDS
    }

    fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    fn generate(&self, plain: &Scalar, key: &Scalar) -> Scalar {
        let mut x = *plain;
        for constant in &self.constants {
            x.add(key);
            x.add(constant);
            let mut x4 = x;
            x4.mul(&x);
            x4.mul(&x4.clone());
            x.mul(&x4);
        }
        x.add(key);
        x
    }

    fn assign(&self, plain: &Scalar, key: &Scalar) -> Vec<Scalar> {
        let mut x2 = Vec::with_capacity(MIMC5_ROUNDS);
        let mut x4 = Vec::with_capacity(MIMC5_ROUNDS);
        let mut x5 = Vec::with_capacity(MIMC5_ROUNDS);
        let mut data = *plain;
        for (i, constant) in self.constants.iter().enumerate() {
            let mut x1 = data;
            x1.add(key);
            x1.add(constant);
            let mut square = x1;
            square.mul(&x1);
            let mut fourth = square;
            fourth.mul(&square);
            let mut fifth = fourth;
            fifth.mul(&x1);
            if i == MIMC5_ROUNDS - 1 {
                fifth.add(key);
            }
            x2.push(square);
            x4.push(fourth);
            x5.push(fifth);
            data = fifth;
        }
        let mut assignment = Vec::with_capacity(self.wires());
        assignment.push(*plain);
        assignment.push(*key);
        assignment.extend(x2);
        assignment.extend(x4);
        assignment.extend(x5);
        assignment
    }
}
